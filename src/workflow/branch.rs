use crate::error::BranchError;

/// Which slot an edge label claims on a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchLabel {
    True,
    False,
    Unlabeled,
}

impl BranchLabel {
    /// Case-insensitive `yes/true/y/t/1` and `no/false/n/f/0`; anything else is unlabelled.
    pub fn classify(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_lowercase()).as_deref() {
            Some("yes" | "true" | "y" | "t" | "1") => BranchLabel::True,
            Some("no" | "false" | "n" | "f" | "0") => BranchLabel::False,
            _ => BranchLabel::Unlabeled,
        }
    }
}

/// The resolved children of a decision node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionBranches<T> {
    /// A single child is taken regardless of the condition.
    Unconditional(T),
    Conditional {
        on_true: T,
        on_false: T,
        /// At least one slot was filled from an unlabelled edge by position.
        positional: bool,
    },
}

impl<T: Copy> DecisionBranches<T> {
    pub fn select(&self, outcome: bool) -> T {
        match *self {
            DecisionBranches::Unconditional(child) => child,
            DecisionBranches::Conditional {
                on_true, on_false, ..
            } => {
                if outcome {
                    on_true
                } else {
                    on_false
                }
            }
        }
    }
}

/// Maps a decision's outgoing `(label, child)` pairs, in edge order, onto its branches.
///
/// With two children, labelled edges take their slot and unlabelled edges
/// fill whatever is left in order, position 0 first. With more than two,
/// both a true and a false label are required.
pub fn resolve_branches<T: Copy>(
    children: &[(Option<&str>, T)],
) -> Result<DecisionBranches<T>, BranchError> {
    match children {
        [] => Err(BranchError::NoChildren),
        [(_, only)] => Ok(DecisionBranches::Unconditional(*only)),
        _ => {
            let mut on_true = None;
            let mut on_false = None;
            let mut unlabeled = Vec::new();

            for (label, child) in children {
                match BranchLabel::classify(*label) {
                    BranchLabel::True if on_true.is_none() => on_true = Some(*child),
                    BranchLabel::False if on_false.is_none() => on_false = Some(*child),
                    BranchLabel::True | BranchLabel::False => {}
                    BranchLabel::Unlabeled => unlabeled.push(*child),
                }
            }

            let mut positional = false;
            if children.len() == 2 {
                let mut remaining = unlabeled.into_iter();
                if on_true.is_none() {
                    on_true = remaining.next();
                    positional |= on_true.is_some();
                }
                if on_false.is_none() {
                    on_false = remaining.next();
                    positional |= on_false.is_some();
                }
            }

            match (on_true, on_false) {
                (Some(on_true), Some(on_false)) => Ok(DecisionBranches::Conditional {
                    on_true,
                    on_false,
                    positional,
                }),
                _ => Err(BranchError::Ambiguous {
                    children: children.len(),
                }),
            }
        }
    }
}
