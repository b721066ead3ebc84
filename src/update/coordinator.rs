//! Interactive choice of which domains to refresh

use super::actions::UpdateActions;
use crate::prompt::Prompter;
use anyhow::Result;
use serde::Serialize;

/// Something the update flow can refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Repository,
    Models,
}

/// Operator decision, parsed once from free text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateChoice {
    Repository,
    Models,
    Both,
    /// Declined
    None,
    /// Unrecognized answer; nothing is applied
    Invalid(String),
}

impl UpdateChoice {
    /// Parse a yes/no answer to a single-domain question
    pub fn parse_yes_no(domain: Domain, answer: &str) -> Self {
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => match domain {
                Domain::Repository => Self::Repository,
                Domain::Models => Self::Models,
            },
            "" | "n" | "no" => Self::None,
            _ => Self::Invalid(answer.trim().to_string()),
        }
    }

    /// Parse an answer to the combined repo/models/both/none question
    pub fn parse_combined(answer: &str) -> Self {
        match answer.trim().to_lowercase().as_str() {
            "repo" => Self::Repository,
            "models" => Self::Models,
            "both" => Self::Both,
            "none" => Self::None,
            _ => Self::Invalid(answer.trim().to_string()),
        }
    }

    pub fn includes(&self, domain: Domain) -> bool {
        matches!(
            (self, domain),
            (Self::Both, _)
                | (Self::Repository, Domain::Repository)
                | (Self::Models, Domain::Models)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Evaluating,
    NothingToDo,
    AwaitingSingleChoice(Domain),
    AwaitingCombinedChoice,
    Applying,
    Done,
}

/// What a coordinator run decided and did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// `None` when no question was asked
    pub choice: Option<UpdateChoice>,
    /// Outcome of the repository refresh, if attempted
    pub repository: Option<bool>,
    /// Outcome of the model refresh, if attempted
    pub models: Option<bool>,
    /// Every state visited, in order
    pub states: Vec<CoordinatorState>,
}

impl UpdateReport {
    pub fn final_state(&self) -> Option<&CoordinatorState> {
        self.states.last()
    }
}

pub struct UpdateCoordinator<'a> {
    prompter: &'a mut dyn Prompter,
    actions: &'a dyn UpdateActions,
    states: Vec<CoordinatorState>,
}

impl<'a> UpdateCoordinator<'a> {
    pub fn new(prompter: &'a mut dyn Prompter, actions: &'a dyn UpdateActions) -> Self {
        Self {
            prompter,
            actions,
            states: vec![CoordinatorState::Evaluating],
        }
    }

    fn enter(&mut self, state: CoordinatorState) {
        tracing::debug!(state = ?state, "Update coordinator transition");
        self.states.push(state);
    }

    /// Ask the operator and apply what they chose
    ///
    /// Sub-action failures are reported in the returned report, never as an
    /// error; only a failure to read an answer is.
    pub async fn run(mut self, repository_stale: bool, models_stale: bool) -> Result<UpdateReport> {
        let choice = match (repository_stale, models_stale) {
            (false, false) => {
                self.enter(CoordinatorState::NothingToDo);
                return Ok(UpdateReport {
                    choice: None,
                    repository: None,
                    models: None,
                    states: self.states,
                });
            }
            (true, true) => {
                self.enter(CoordinatorState::AwaitingCombinedChoice);
                let answer = self.prompter.ask(
                    "Both repository and models have updates available. What would you like to update? (repo/models/both/none)",
                )?;
                UpdateChoice::parse_combined(&answer)
            }
            (true, false) => {
                self.enter(CoordinatorState::AwaitingSingleChoice(Domain::Repository));
                let answer = self
                    .prompter
                    .ask("Repository updates are available. Update repository? (yes/no)")?;
                UpdateChoice::parse_yes_no(Domain::Repository, &answer)
            }
            (false, true) => {
                self.enter(CoordinatorState::AwaitingSingleChoice(Domain::Models));
                let answer = self
                    .prompter
                    .ask("Model updates may be available. Update models? (yes/no)")?;
                UpdateChoice::parse_yes_no(Domain::Models, &answer)
            }
        };

        self.enter(CoordinatorState::Applying);
        let mut report = UpdateReport {
            choice: Some(choice.clone()),
            repository: None,
            models: None,
            states: Vec::new(),
        };

        match &choice {
            UpdateChoice::None => tracing::info!("Update cancelled by user"),
            UpdateChoice::Invalid(answer) => {
                tracing::warn!(answer = %answer, "Unrecognized answer, nothing was updated")
            }
            _ => {}
        }

        if choice.includes(Domain::Repository) {
            let ok = match self.actions.refresh_repository().await {
                Ok(()) => {
                    tracing::info!("Repository update completed successfully");
                    true
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    tracing::error!(error = %message, "Repository update failed");
                    false
                }
            };
            report.repository = Some(ok);
        }

        if choice.includes(Domain::Models) {
            let ok = match self.actions.refresh_models().await {
                Ok(()) => {
                    tracing::info!("Model update completed successfully");
                    true
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    tracing::error!(error = %message, "Model update failed");
                    false
                }
            };
            report.models = Some(ok);
        }

        self.enter(CoordinatorState::Done);
        report.states = self.states;
        Ok(report)
    }
}
