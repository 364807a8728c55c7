//! Writer-capability registry keyed by logical column type.
//!
//! The registry answers one question for the planner: can this logical
//! type produce a binary column writer directly, without conversion? Types
//! absent from the registry are routed through the fallback converter (see
//! `convert`). The registry is purely a lookup/factory service with no
//! side effects; the process-wide instance from [`TypeRegistry::global`]
//! is initialized once, read-only afterwards, and safe for unsynchronized
//! concurrent reads by any number of write sessions.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::schema::{LogicalDataType, LogicalTimestampUnit};
use crate::storage::{StorageResult, TableLocation};
use crate::types::ColumnWriter;
use crate::types::fixed::{BooleanProvider, PrimitiveProvider};
use crate::types::varlen::VarLenProvider;

use arrow::datatypes::{
    Date32Type, Float32Type, Float64Type, Int32Type, Int64Type, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType,
};

/// The registered ability of a logical type to produce a binary column
/// writer directly, without conversion.
pub trait TypeProvider: Send + Sync {
    /// The logical type this provider handles.
    fn data_type(&self) -> LogicalDataType;

    /// Construct a writer for one column artifact in the staging
    /// directory.
    fn binary_writer(
        &self,
        location: &TableLocation,
        column: &str,
    ) -> StorageResult<Box<dyn ColumnWriter>>;
}

/// Lookup service mapping logical types to writer capabilities.
pub struct TypeRegistry {
    providers: HashMap<LogicalDataType, Arc<dyn TypeProvider>>,
}

impl TypeRegistry {
    /// An empty registry with no capabilities.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// A registry with all built-in providers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for provider in builtin_providers() {
            registry.register(provider);
        }
        registry
    }

    /// Register a provider, replacing any existing provider for the same
    /// logical type.
    pub fn register(&mut self, provider: Arc<dyn TypeProvider>) {
        self.providers.insert(provider.data_type(), provider);
    }

    /// Resolve the binary writer capability for `data_type`, if
    /// registered.
    pub fn binary_writer_provider(
        &self,
        data_type: &LogicalDataType,
    ) -> Option<&Arc<dyn TypeProvider>> {
        self.providers.get(data_type)
    }

    /// The process-wide registry of built-in capabilities.
    pub fn global() -> &'static TypeRegistry {
        static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(TypeRegistry::with_builtins)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn builtin_providers() -> Vec<Arc<dyn TypeProvider>> {
    vec![
        Arc::new(BooleanProvider),
        Arc::new(PrimitiveProvider::<Int32Type>::new(LogicalDataType::Int32)),
        Arc::new(PrimitiveProvider::<Int64Type>::new(LogicalDataType::Int64)),
        Arc::new(PrimitiveProvider::<Float32Type>::new(
            LogicalDataType::Float32,
        )),
        Arc::new(PrimitiveProvider::<Float64Type>::new(
            LogicalDataType::Float64,
        )),
        Arc::new(PrimitiveProvider::<Date32Type>::new(LogicalDataType::Date32)),
        Arc::new(PrimitiveProvider::<TimestampMillisecondType>::new(
            LogicalDataType::Timestamp {
                unit: LogicalTimestampUnit::Millis,
            },
        )),
        Arc::new(PrimitiveProvider::<TimestampMicrosecondType>::new(
            LogicalDataType::Timestamp {
                unit: LogicalTimestampUnit::Micros,
            },
        )),
        Arc::new(PrimitiveProvider::<TimestampNanosecondType>::new(
            LogicalDataType::Timestamp {
                unit: LogicalTimestampUnit::Nanos,
            },
        )),
        Arc::new(VarLenProvider::utf8()),
        Arc::new(VarLenProvider::binary()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_cover_the_direct_types() {
        let registry = TypeRegistry::with_builtins();

        for data_type in [
            LogicalDataType::Bool,
            LogicalDataType::Int32,
            LogicalDataType::Int64,
            LogicalDataType::Float32,
            LogicalDataType::Float64,
            LogicalDataType::Utf8,
            LogicalDataType::Binary,
            LogicalDataType::Date32,
            LogicalDataType::Timestamp {
                unit: LogicalTimestampUnit::Millis,
            },
            LogicalDataType::Timestamp {
                unit: LogicalTimestampUnit::Nanos,
            },
        ] {
            assert!(
                registry.binary_writer_provider(&data_type).is_some(),
                "missing capability for {data_type}"
            );
        }
    }

    #[test]
    fn types_without_a_direct_writer_are_absent() {
        let registry = TypeRegistry::with_builtins();

        assert!(
            registry
                .binary_writer_provider(&LogicalDataType::Decimal {
                    precision: 18,
                    scale: 4,
                })
                .is_none()
        );
        assert!(
            registry
                .binary_writer_provider(&LogicalDataType::Other("engine::Blob".to_string()))
                .is_none()
        );
    }

    #[test]
    fn register_replaces_an_existing_provider() {
        let mut registry = TypeRegistry::new();
        registry.register(Arc::new(VarLenProvider::utf8()));
        let first = Arc::as_ptr(
            registry
                .binary_writer_provider(&LogicalDataType::Utf8)
                .expect("utf8 registered"),
        );

        registry.register(Arc::new(VarLenProvider::utf8()));
        let second = Arc::as_ptr(
            registry
                .binary_writer_provider(&LogicalDataType::Utf8)
                .expect("utf8 registered"),
        );

        assert_ne!(first, second);
    }

    #[test]
    fn global_registry_is_shared() {
        let a = TypeRegistry::global() as *const TypeRegistry;
        let b = TypeRegistry::global() as *const TypeRegistry;
        assert_eq!(a, b);
    }
}
