//! Call trait - argument records for typed operations.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::OperationError;

/// Ties an operation name to its argument record.
///
/// # Example
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Unbind {
///     consumer_id: String,
///     repo_id: String,
///     distributor_id: String,
/// }
///
/// impl Call for Unbind {
///     const NAME: &'static str = "consumer.unbind";
/// }
/// ```
///
/// # Trait bounds
/// - `DeserializeOwned`: rebuilt from the descriptor's `args` on the worker
/// - `Send + 'static`: moved into the worker task
pub trait Call: DeserializeOwned + Send + 'static {
    /// Operation name, used in logs and task records.
    const NAME: &'static str;

    /// Decode the ordered argument list.
    ///
    /// The default reads the list positionally into the record's fields, the
    /// same order they are declared in.
    fn from_args(args: Vec<Value>) -> Result<Self, OperationError> {
        serde_json::from_value(Value::Array(args)).map_err(|e| {
            OperationError::InvalidArguments(format!("{}: {e}", Self::NAME))
        })
    }
}
