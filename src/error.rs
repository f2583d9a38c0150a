use thiserror::Error;

/// Failure to retrieve a remote artifact.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The artifact is not available locally and fetching is disabled.
    #[error("{url} is not cached and fetching is disabled")]
    Offline { url: String },
}

/// Failure local to one dataset (a feed, a county table, a geometry archive).
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Network, HTTP or cache failure.
    #[error("{dataset}: retrieval failed: {source}")]
    Retrieval {
        dataset: String,
        #[source]
        source: FetchError,
    },

    /// A table the dataset requires is absent from its archive or directory.
    #[error("{dataset}: missing table {table}")]
    MissingTable { dataset: String, table: String },

    /// The dataset was retrieved but could not be parsed.
    #[error("{dataset}: malformed data: {message}")]
    Malformed { dataset: String, message: String },
}

impl DatasetError {
    /// Name of the dataset this failure belongs to.
    pub fn dataset(&self) -> &str {
        match self {
            Self::Retrieval { dataset, .. }
            | Self::MissingTable { dataset, .. }
            | Self::Malformed { dataset, .. } => dataset,
        }
    }

    /// Wrap a parse error (with its whole context chain) as `Malformed`.
    pub fn malformed(dataset: &str, err: &anyhow::Error) -> Self {
        Self::Malformed { dataset: dataset.to_string(), message: format!("{err:#}") }
    }
}

/// Failure to assemble the final map.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("nothing to compose: no population units and no transit layers")]
    NothingToCompose,

    #[error("duplicate layer name: {0}")]
    DuplicateLayer(String),
}

/// Failure of a whole pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline cancelled; partial layers discarded")]
    Cancelled,

    #[error(transparent)]
    Compose(#[from] ComposeError),
}

/// Typed result for one dataset: the caller can tell "no data for this county"
/// apart from "network unreachable".
#[derive(Debug)]
pub enum DatasetOutcome<T> {
    Loaded(T),
    Partial { value: T, failures: Vec<DatasetError> },
    Failed(DatasetError),
}

impl<T> DatasetOutcome<T> {
    /// Build an outcome from a value and any failures collected while producing it.
    pub fn from_parts(value: T, failures: Vec<DatasetError>) -> Self {
        if failures.is_empty() { Self::Loaded(value) } else { Self::Partial { value, failures } }
    }

    /// Split into the usable value (if any) and the failures to report.
    pub fn into_parts(self) -> (Option<T>, Vec<DatasetError>) {
        match self {
            Self::Loaded(value) => (Some(value), Vec::new()),
            Self::Partial { value, failures } => (Some(value), failures),
            Self::Failed(err) => (None, vec![err]),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) | Self::Partial { value, .. } => Some(value),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool { matches!(self, Self::Failed(_)) }
}

impl<T> From<Result<T, DatasetError>> for DatasetOutcome<T> {
    fn from(result: Result<T, DatasetError>) -> Self {
        match result {
            Ok(value) => Self::Loaded(value),
            Err(err) => Self::Failed(err),
        }
    }
}
