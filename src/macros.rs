//! Wire message helpers shared by the versioned adapters
//!
//! Invoked from a version module that has `types` (the canonical module),
//! `Versioned`, `ConversionError`, `Serialize` and `Deserialize` in scope.

/// Messages with no fields
macro_rules! empty_message {
    ($wire:ident, $canonical:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $wire {}

        impl Versioned for $wire {
            type Canonical = types::$canonical;

            fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
                Ok(types::$canonical {})
            }

            fn from_canonical(_: Self::Canonical) -> Result<Self, ConversionError> {
                Ok(Self {})
            }
        }
    };
}
