use clap::ValueEnum;
use solver_cip::{BranchingRule, CipSettings, NodeSelection};

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum NodeSelectionChoice {
    BestBound,
    DepthFirst,
    BestEstimate,
    Hybrid,
    TwoPhase,
    Plunging,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BranchingChoice {
    MostFractional,
    Pseudocost,
    Hybrid,
}

impl From<NodeSelectionChoice> for NodeSelection {
    fn from(choice: NodeSelectionChoice) -> Self {
        match choice {
            NodeSelectionChoice::BestBound => NodeSelection::BestBound,
            NodeSelectionChoice::DepthFirst => NodeSelection::DepthFirst,
            NodeSelectionChoice::BestEstimate => NodeSelection::BestEstimate,
            NodeSelectionChoice::Hybrid => NodeSelection::Hybrid { dive_freq: 5 },
            NodeSelectionChoice::TwoPhase => NodeSelection::TwoPhase,
            NodeSelectionChoice::Plunging => NodeSelection::Plunging { max_plunge_depth: 10 },
        }
    }
}

impl From<BranchingChoice> for BranchingRule {
    fn from(choice: BranchingChoice) -> Self {
        match choice {
            BranchingChoice::MostFractional => BranchingRule::MostFractional,
            BranchingChoice::Pseudocost => BranchingRule::Pseudocost,
            BranchingChoice::Hybrid => BranchingRule::Hybrid { switch_after_nodes: 20 },
        }
    }
}

/// Short label for reports, e.g. `best-bound/pseudocost`.
pub fn settings_label(selection: NodeSelectionChoice, branching: BranchingChoice, cuts: bool) -> String {
    let mut label = format!("{}/{}", value_name(selection), value_name(branching));
    if !cuts {
        label.push_str("/nocuts");
    }
    label
}

fn value_name<T: ValueEnum>(value: T) -> String {
    value
        .to_possible_value()
        .map(|p| p.get_name().to_string())
        .unwrap_or_default()
}

pub fn build_settings(
    selection: NodeSelectionChoice,
    branching: BranchingChoice,
    cuts: bool,
    node_limit: u64,
    time_limit: Option<f64>,
) -> CipSettings {
    let mut settings = CipSettings::default()
        .with_node_selection(selection.into())
        .with_branching_rule(branching.into())
        .with_node_limit(node_limit);
    if let Some(seconds) = time_limit {
        settings = settings.with_time_limit(seconds);
    }
    if !cuts {
        settings = settings.without_cuts();
    }
    settings
}
