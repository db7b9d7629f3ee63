//! Argument builder.
//!
//! Parses and validates the user-supplied mount-options list, and renders
//! it back out as (a) the kernel-level subset (currently just read-only),
//! (b) the mounter binary's argv, and (c) the environment the mounter
//! needs. The transformation is deterministic, composable, and idempotent:
//! `parse(render(options)) == options` modulo canonical (sorted) key
//! order.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Token keys typed and validated by this builder. Anything else passes
/// through to the mounter binary unchanged.
const KEY_READ_ONLY: &str = "read-only";
const KEY_UID: &str = "uid";
const KEY_GID: &str = "gid";
const KEY_ALLOW_OTHER: &str = "allow-other";
const KEY_ALLOW_ROOT: &str = "allow-root";
const KEY_FILE_MODE: &str = "file-mode";
const KEY_DIR_MODE: &str = "dir-mode";
const KEY_METADATA_TTL: &str = "metadata-ttl";
const KEY_FOREGROUND: &str = "foreground";
const BOOLEAN_FLAG_KEYS: &[&str] = &[
    KEY_READ_ONLY,
    KEY_ALLOW_OTHER,
    KEY_ALLOW_ROOT,
    KEY_FOREGROUND,
    "debug",
    "debug-crt",
];

/// The normalized, validated mount-option set.
///
/// Internally a single ordered map of `key -> Option<value>` (a bare flag
/// has no value); duplicate occurrences of the same key are reconciled by
/// simply overwriting during [`Self::parse`], implementing "last wins".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    tokens: BTreeMap<String, Option<String>>,
}

impl MountOptions {
    /// Parses the raw mount-option token list from the volume spec.
    ///
    /// Each token is split on the first `=` or, failing that, the first
    /// whitespace, to normalize `k=v` and `k v` forms. Known tokens are
    /// typed and validated; unknown tokens are kept verbatim.
    pub fn parse(raw: &[String]) -> Result<Self> {
        let mut tokens = BTreeMap::new();
        for token in raw {
            let (key, value) = split_token(token)?;
            validate_known(&key, value.as_deref())?;
            tokens.insert(key, value);
        }
        Ok(Self { tokens })
    }

    /// True if the `read-only` kernel-level flag is set.
    #[must_use]
    pub fn read_only(&self) -> bool {
        self.tokens.contains_key(KEY_READ_ONLY)
    }

    /// Applies the `fsGroup`-driven overrides: the group-id flag is overridden to `fs_group`, and
    /// `allow-other`, `dir-mode=0770`, `file-mode=0660` are injected if
    /// absent.
    pub fn apply_fs_group(&mut self, fs_group: &str) {
        self.tokens
            .insert(KEY_GID.to_string(), Some(fs_group.to_string()));
        self.tokens.entry(KEY_ALLOW_OTHER.to_string()).or_insert(None);
        self.tokens
            .entry(KEY_DIR_MODE.to_string())
            .or_insert_with(|| Some("0770".to_string()));
        self.tokens
            .entry(KEY_FILE_MODE.to_string())
            .or_insert_with(|| Some("0660".to_string()));
    }

    /// Ensures the mounter is always started with `--foreground`, which
    /// the supervisor (component F) depends on to track liveness via the
    /// process's own lifetime rather than a self-daemonized child.
    pub fn ensure_foreground(&mut self) {
        self.tokens.entry(KEY_FOREGROUND.to_string()).or_insert(None);
    }

    /// Renders the full, validated token set back out (including
    /// `read-only`), in canonical (sorted-by-key) order. Used by the
    /// round-trip property test; not what's handed to the mounter process
    /// (see [`Self::mounter_argv`]).
    #[must_use]
    pub fn to_tokens(&self) -> Vec<String> {
        self.tokens.iter().map(render_token).collect()
    }

    /// Renders the mounter-binary argv: every token except the
    /// kernel-level `read-only` flag, which is consumed by the mount
    /// syscall instead (component B) and never passed to the child
    /// process.
    #[must_use]
    pub fn mounter_argv(&self) -> Vec<String> {
        self.tokens
            .iter()
            .filter(|(k, _)| k.as_str() != KEY_READ_ONLY)
            .map(render_token)
            .collect()
    }

    /// The numeric uid override, if set and valid (validated at parse
    /// time, so this never fails at read time).
    #[must_use]
    pub fn uid(&self) -> Option<u32> {
        self.tokens.get(KEY_UID).and_then(|v| v.as_deref()?.parse().ok())
    }

    /// The numeric gid override, if set.
    #[must_use]
    pub fn gid(&self) -> Option<u32> {
        self.tokens.get(KEY_GID).and_then(|v| v.as_deref()?.parse().ok())
    }

    /// True if `allow-other` or `allow-root` was requested — used by the
    /// mount primitives to decide whether to set `allow_other` in the
    /// kernel mount options.
    #[must_use]
    pub fn allows_other_or_root(&self) -> bool {
        self.tokens.contains_key(KEY_ALLOW_OTHER) || self.tokens.contains_key(KEY_ALLOW_ROOT)
    }
}

fn render_token((key, value): (&String, &Option<String>)) -> String {
    match value {
        Some(v) => format!("--{key}={v}"),
        None => format!("--{key}"),
    }
}

fn split_token(raw: &str) -> Result<(String, Option<String>)> {
    let trimmed = raw.trim().trim_start_matches("--");
    if trimmed.is_empty() {
        return Err(Error::EmptyToken);
    }

    if let Some((key, value)) = trimmed.split_once('=') {
        return Ok((key.trim().to_string(), Some(value.trim().to_string())));
    }
    if let Some((key, value)) = trimmed.split_once(char::is_whitespace) {
        let value = value.trim();
        return if value.is_empty() {
            Ok((key.trim().to_string(), None))
        } else {
            Ok((key.trim().to_string(), Some(value.to_string())))
        };
    }
    Ok((trimmed.to_string(), None))
}

fn validate_known(key: &str, value: Option<&str>) -> Result<()> {
    match key {
        KEY_UID | KEY_GID => {
            let value = value.ok_or_else(|| Error::InvalidValue {
                key: key.to_string(),
                expected: "integer",
                value: String::new(),
            })?;
            value.parse::<u32>().map_err(|_| Error::InvalidValue {
                key: key.to_string(),
                expected: "integer",
                value: value.to_string(),
            })?;
            Ok(())
        }
        KEY_METADATA_TTL => {
            let value = value.ok_or_else(|| Error::InvalidValue {
                key: key.to_string(),
                expected: "integer seconds",
                value: String::new(),
            })?;
            value.parse::<u64>().map_err(|_| Error::InvalidValue {
                key: key.to_string(),
                expected: "integer seconds",
                value: value.to_string(),
            })?;
            Ok(())
        }
        KEY_FILE_MODE | KEY_DIR_MODE => {
            let value = value.ok_or_else(|| Error::InvalidValue {
                key: key.to_string(),
                expected: "octal mode",
                value: String::new(),
            })?;
            let digits = value.trim_start_matches('0');
            if !(1..=4).contains(&value.len()) || !value.chars().all(|c| ('0'..='7').contains(&c))
            {
                return Err(Error::InvalidValue {
                    key: key.to_string(),
                    expected: "octal mode",
                    value: value.to_string(),
                });
            }
            let _ = digits;
            Ok(())
        }
        key if BOOLEAN_FLAG_KEYS.contains(&key) => {
            if let Some(value) = value {
                if value != "true" && value != "false" {
                    return Err(Error::InvalidValue {
                        key: key.to_string(),
                        expected: "boolean",
                        value: value.to_string(),
                    });
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
