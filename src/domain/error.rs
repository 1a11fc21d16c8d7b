//! Domain error types.

use chrono::NaiveDate;

/// Errors raised by the node tree. All of them are fatal to a run: they signal
/// a logic error in strategy code or missing price data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error("{operation} is not supported on node {node}")]
    UnsupportedOperation {
        node: String,
        operation: &'static str,
    },

    #[error("cannot allocate capital to parentless security {node}")]
    InvalidParent { node: String },

    #[error("cannot allocate capital to {node} because price is {price} as of {now:?}")]
    InvalidPrice {
        node: String,
        price: f64,
        now: Option<NaiveDate>,
    },

    #[error(
        "position is open ({position}) and latest price is NaN for security {node}; cannot update node value"
    )]
    UnvaluableOpenPosition { node: String, position: f64 },

    #[error("security {node} has no price universe bound (setup was not called)")]
    NotSetUp { node: String },

    #[error("date {date} is not on the time axis of {node}")]
    UnknownDate { node: String, date: NaiveDate },

    #[error("{parent} already has a child named {name}")]
    DuplicateName { parent: String, name: String },

    #[error("could not update {node} on {date}: last value and net flows are zero but value is not")]
    ZeroBase { node: String, date: NaiveDate },

    #[error("{node} has no current date; update the tree before trading")]
    NotStarted { node: String },
}

/// Top-level error type for treetrader.
#[derive(Debug, thiserror::Error)]
pub enum TreetraderError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("price data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TreetraderError {
    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            TreetraderError::Io(_) => 1,
            TreetraderError::ConfigParse { .. }
            | TreetraderError::ConfigMissing { .. }
            | TreetraderError::ConfigInvalid { .. } => 2,
            TreetraderError::Data { .. } => 3,
            TreetraderError::Tree(_) => 4,
        }
    }
}

impl From<&TreetraderError> for std::process::ExitCode {
    fn from(err: &TreetraderError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
