use thiserror::Error;

/// Terminal failures of the evaluation engine.
///
/// Every precondition failure is surfaced verbatim to the caller; the engine
/// never partially evaluates and never retries. Each variant carries the
/// offending name where one exists so callers can render an actionable
/// diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The policy set is empty; there is nothing to decide against.
    #[error("no policies to evaluate")]
    NoPolicies,

    /// A policy references a field absent from the input. Named after the
    /// first such policy in evaluation order.
    #[error("policy '{0}' has no matching custom field")]
    MissingField(String),

    /// An input field has no corresponding policy. Which offending key is
    /// named depends on map iteration order; callers must not rely on it.
    #[error("custom field '{0}' does not match any policy")]
    UnknownField(String),
}

/// Policy store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("postgres connect failed: {0}")]
    Connect(String),

    #[error("postgres schema create failed: {0}")]
    Schema(String),

    #[error("store query failed: {0}")]
    Query(String),

    #[error("stored policy could not be decoded: {0}")]
    Decode(String),
}
