//! Voting contract ABI and interface descriptors.

use alloy::json_abi::{Function, JsonAbi, Param};
use thiserror::Error;

alloy::sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct Candidate {
        string name;
        uint256 voteCount;
    }

    function getAllVotesOfCandiates() external view returns (Candidate[] memory);
    function getVotingStatus() external view returns (bool);
    function getRemainingTime() external view returns (uint256);
    function vote(uint256 candidateIndex) external;
}

/// A function selector.
pub type Selector = [u8; 4];

/// The operations the client needs from a voting contract.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Operation {
    /// `() -> (string name, uint256 voteCount)[]`
    ListCandidates,
    /// `() -> bool`
    VotingOpen,
    /// `() -> uint256`
    RemainingSeconds,
    /// `(uint256 candidateIndex) -> ()`
    Vote,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::ListCandidates,
        Operation::VotingOpen,
        Operation::RemainingSeconds,
        Operation::Vote,
    ];

    /// Canonical input and output types the contract function must have.
    fn shape(self) -> (&'static [&'static str], &'static [&'static str]) {
        match self {
            Self::ListCandidates => (&[], &["(string,uint256)[]"]),
            Self::VotingOpen => (&[], &["bool"]),
            Self::RemainingSeconds => (&[], &["uint256"]),
            Self::Vote => (&["uint256"], &[]),
        }
    }
}

/// Contract function names for each operation.
#[derive(Clone, Debug)]
pub struct MethodNames {
    pub list_candidates: String,
    pub voting_open: String,
    pub remaining_seconds: String,
    pub vote: String,
}

impl MethodNames {
    fn get(&self, operation: Operation) -> &str {
        match operation {
            Operation::ListCandidates => &self.list_candidates,
            Operation::VotingOpen => &self.voting_open,
            Operation::RemainingSeconds => &self.remaining_seconds,
            Operation::Vote => &self.vote,
        }
    }
}

impl Default for MethodNames {
    fn default() -> Self {
        Self {
            list_candidates: "getAllVotesOfCandiates".to_owned(),
            voting_open: "getVotingStatus".to_owned(),
            remaining_seconds: "getRemainingTime".to_owned(),
            vote: "vote".to_owned(),
        }
    }
}

/// Maps each operation to the selector of the contract function
/// implementing it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InterfaceDescriptor {
    list_candidates: Selector,
    voting_open: Selector,
    remaining_seconds: Selector,
    vote: Selector,
}

impl InterfaceDescriptor {
    /// The descriptor of the reference voting contract.
    pub fn voting() -> Self {
        use alloy::sol_types::SolCall as _;

        Self {
            list_candidates: getAllVotesOfCandiatesCall::SELECTOR,
            voting_open: getVotingStatusCall::SELECTOR,
            remaining_seconds: getRemainingTimeCall::SELECTOR,
            vote: voteCall::SELECTOR,
        }
    }

    /// Builds a descriptor from a Solidity JSON ABI, checking that every
    /// operation is present with the expected argument and return types.
    ///
    /// Overloaded functions resolve to the overload with the expected shape.
    pub fn from_abi_json(json: &str, names: &MethodNames) -> Result<Self, DescriptorError> {
        let abi = serde_json::from_str::<JsonAbi>(json)?;
        let mut selectors = [[0_u8; 4]; 4];

        for (operation, selector) in Operation::ALL.into_iter().zip(&mut selectors) {
            let function = find_function(&abi, operation, names.get(operation))?;
            tracing::debug!(?operation, signature = %function.signature(), "resolved contract function");
            *selector = function.selector().0;
        }

        let [list_candidates, voting_open, remaining_seconds, vote] = selectors;
        Ok(Self {
            list_candidates,
            voting_open,
            remaining_seconds,
            vote,
        })
    }

    /// Returns the selector used for an operation.
    pub fn selector(&self, operation: Operation) -> Selector {
        match operation {
            Operation::ListCandidates => self.list_candidates,
            Operation::VotingOpen => self.voting_open,
            Operation::RemainingSeconds => self.remaining_seconds,
            Operation::Vote => self.vote,
        }
    }
}

impl Default for InterfaceDescriptor {
    fn default() -> Self {
        Self::voting()
    }
}

fn find_function<'a>(
    abi: &'a JsonAbi,
    operation: Operation,
    name: &str,
) -> Result<&'a Function, DescriptorError> {
    let overloads = abi
        .function(name)
        .ok_or_else(|| DescriptorError::MissingFunction(name.to_owned()))?;
    let (inputs, outputs) = operation.shape();

    overloads
        .iter()
        .find(|function| types(&function.inputs) == inputs && types(&function.outputs) == outputs)
        .ok_or_else(|| DescriptorError::ShapeMismatch {
            name: name.to_owned(),
            found: overloads
                .iter()
                .map(|function| shape(&types(&function.inputs)[..], &types(&function.outputs)[..]))
                .collect::<Vec<_>>()
                .join(", "),
            expected: shape(inputs, outputs),
        })
}

/// Canonical types as used in function signatures, with tuples expanded
/// into their component types.
fn types(params: &[Param]) -> Vec<String> {
    params
        .iter()
        .map(|param| param.selector_type().into_owned())
        .collect()
}

fn shape<S>(inputs: &[S], outputs: &[S]) -> String
where
    S: AsRef<str>,
{
    let join = |types: &[S]| {
        types
            .iter()
            .map(|ty| ty.as_ref())
            .collect::<Vec<&str>>()
            .join(",")
    };
    format!("({}) -> ({})", join(inputs), join(outputs))
}

/// An interface descriptor that does not fit the voting contract.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("malformed ABI JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ABI has no function '{0}'")]
    MissingFunction(String),

    #[error("function '{name}' has shape {found}, expected {expected}")]
    ShapeMismatch {
        name: String,
        found: String,
        expected: String,
    },
}
