// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacted wrapper for credentials carried in configuration.
//!
//! Provider tokens and substrate API keys flow through config dumps, tracing
//! fields and the env list handed to the ephemeral worker. [`Secret`] keeps
//! them out of `Debug`, `Display` and `Serialize` output and zeroizes the
//! value on drop. Reading the value requires an explicit [`Secret::expose`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// Placeholder printed instead of a secret value.
pub const REDACTED: &str = "[REDACTED]";

#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Access the wrapped value. Call sites opt in to seeing the secret.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl SecretString {
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Serialize for Secret<T>
where
	T: Serialize + Zeroize,
{
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(REDACTED)
	}
}

impl<'de, T> Deserialize<'de> for Secret<T>
where
	T: Deserialize<'de> + Zeroize,
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		T::deserialize(deserializer).map(Secret::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn debug_and_display_are_redacted() {
		let token = Secret::new("dop_v1_abcdef".to_string());

		assert_eq!(format!("{token}"), REDACTED);
		assert!(!format!("{token:?}").contains("dop_v1_abcdef"));
	}

	#[test]
	fn serialize_never_leaks() {
		let token = Secret::new("dop_v1_abcdef".to_string());
		let json = serde_json::to_string(&token).unwrap();
		assert_eq!(json, "\"[REDACTED]\"");
	}

	#[test]
	fn deserialize_keeps_value() {
		let token: SecretString = serde_json::from_str("\"dop_v1_abcdef\"").unwrap();
		assert_eq!(token.expose(), "dop_v1_abcdef");
	}

	proptest! {
		#[test]
		fn display_never_contains_value(value in "[a-zA-Z0-9_]{8,64}") {
			let secret = Secret::new(value.clone());
			let shown = format!("{secret} {secret:?}");
			prop_assert!(!shown.contains(&value));
		}
	}
}
