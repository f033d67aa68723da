//! Recorded transactional histories.
//!
//! A history is a slice of [`Transaction`]s, each an ordered sequence of
//! micro-operations ([`Mop`]) executed by one logical client. Transactions
//! are identified by their monotonic position in the history ([`TxnId`]).
//!
//! Key and value types are parameters everywhere, so a history mixing key
//! or value types cannot be constructed in the first place.

use core::fmt::{self, Debug, Display, Formatter};

pub mod analyzer;

/// Identifies a transaction by its monotonic index in the history.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(pub u64);

impl Display for TxnId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Outcome of a transaction.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    /// Committed.
    Ok,
    /// Definitely aborted.
    Fail,
    /// Indeterminate (e.g. timed out mid-commit).
    Info,
}

/// A single micro-operation within a transaction.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mop<Variable, Version> {
    Read {
        variable: Variable,
        // None represents an uninitialized version
        version: Option<Version>,
    },
    Write {
        variable: Variable,
        version: Version,
    },
}

impl<Variable, Version> Mop<Variable, Version> {
    pub const fn read_empty(variable: Variable) -> Self {
        Self::Read {
            variable,
            version: None,
        }
    }

    pub const fn read(variable: Variable, version: Version) -> Self {
        Self::Read {
            variable,
            version: Some(version),
        }
    }

    pub const fn write(variable: Variable, version: Version) -> Self {
        Self::Write { variable, version }
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

impl<Variable, Version> Mop<Variable, Version>
where
    Variable: Clone,
    Version: Clone,
{
    #[must_use]
    pub fn variable(&self) -> Variable {
        match self {
            Self::Read { variable, .. } | Self::Write { variable, .. } => variable.clone(),
        }
    }

    #[must_use]
    pub fn version(&self) -> Option<Version> {
        match self {
            Self::Read { version, .. } => version.clone(),
            Self::Write { version, .. } => Some(version.clone()),
        }
    }
}

impl<Variable, Version> Debug for Mop<Variable, Version>
where
    Variable: Debug,
    Version: Debug,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Read { variable, version } => {
                write!(f, "{variable:?}=>")?;
                if let Some(version) = version {
                    write!(f, "{version:?}")?;
                } else {
                    write!(f, "?")?;
                }
                Ok(())
            }
            Self::Write { variable, version } => write!(f, "{variable:?}<={version:?}"),
        }
    }
}

impl<Variable, Version> Display for Mop<Variable, Version>
where
    Variable: Display,
    Version: Display,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Write { variable, version } => write!(f, "{variable}:={version}"),
            Self::Read { variable, version } => {
                if let Some(version) = version {
                    write!(f, "{variable}=={version}")
                } else {
                    write!(f, "{variable}==?")
                }
            }
        }
    }
}

/// A recorded transaction: an atomic sequence of micro-operations executed
/// by one logical client, with an outcome and an optional wall-clock
/// completion interval.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Clone, PartialEq, Eq)]
pub struct Transaction<Variable, Version> {
    pub id: TxnId,
    /// The logical client that submitted this transaction.
    pub process: u64,
    pub outcome: Outcome,
    pub mops: Vec<Mop<Variable, Version>>,
    /// Wall-clock `(start, end)` of the commit interval, when recorded.
    pub interval: Option<(u64, u64)>,
}

impl<Variable, Version> Transaction<Variable, Version> {
    #[must_use]
    pub const fn ok(id: u64, process: u64, mops: Vec<Mop<Variable, Version>>) -> Self {
        Self {
            id: TxnId(id),
            process,
            outcome: Outcome::Ok,
            mops,
            interval: None,
        }
    }

    #[must_use]
    pub const fn failed(id: u64, process: u64, mops: Vec<Mop<Variable, Version>>) -> Self {
        Self {
            id: TxnId(id),
            process,
            outcome: Outcome::Fail,
            mops,
            interval: None,
        }
    }

    #[must_use]
    pub const fn info(id: u64, process: u64, mops: Vec<Mop<Variable, Version>>) -> Self {
        Self {
            id: TxnId(id),
            process,
            outcome: Outcome::Info,
            mops,
            interval: None,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, start: u64, end: u64) -> Self {
        self.interval = Some((start, end));
        self
    }

    #[must_use]
    pub const fn committed(&self) -> bool {
        matches!(self.outcome, Outcome::Ok)
    }
}

impl<Variable, Version> Debug for Transaction<Variable, Version>
where
    Variable: Debug,
    Version: Debug,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}{:?}", self.id, self.mops)?;
        match self.outcome {
            Outcome::Ok => Ok(()),
            Outcome::Fail => write!(f, "!"),
            Outcome::Info => write!(f, "?"),
        }
    }
}
