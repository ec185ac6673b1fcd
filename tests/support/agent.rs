//! Assertions over commands queued for fake agents.

use harbormaster::domain::{AgentCommand, DeployAction, DeployCommand};

/// Every deploy or undeploy command, in queue order.
pub fn deploys(commands: &[AgentCommand]) -> Vec<DeployCommand> {
    commands
        .iter()
        .filter_map(|command| match command {
            AgentCommand::Deploy(cmd) => Some((**cmd).clone()),
            _ => None,
        })
        .collect()
}

/// Sequences of the `deploy` commands, ignoring undeploys.
pub fn deployed_sequences(commands: &[AgentCommand]) -> Vec<u64> {
    deploys(commands)
        .into_iter()
        .filter(|cmd| cmd.action == DeployAction::Deploy)
        .map(|cmd| cmd.sequence)
        .collect()
}

pub fn kinds(commands: &[AgentCommand]) -> Vec<&'static str> {
    commands.iter().map(AgentCommand::kind).collect()
}
