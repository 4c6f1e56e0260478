//! Limb sets - one phase machine per limb with configurable rep credit

use serde::{Deserialize, Serialize};
use tracing::info;

use repsense_core::{FrameTime, RepsenseError, RepsenseResult};

use crate::{MachineConfig, Phase, PhaseInput, PhaseMachine, PhaseTransition};

/// How limb completions turn into repetitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepCredit {
    /// Every limb's completion edge counts on its own
    #[default]
    Independent,
    /// One repetition once every limb has completed since the last credit
    Together,
}

/// A committed transition tagged with its limb
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimbTransition {
    pub limb: String,
    pub transition: PhaseTransition,
}

/// Outcome of one frame across all limbs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimbUpdate {
    pub transitions: Vec<LimbTransition>,
    /// Repetitions credited this frame
    pub credited: u64,
}

#[derive(Debug, Clone)]
struct Limb {
    name: String,
    machine: PhaseMachine,
    awaiting_partner: bool,
}

/// Independent phase machines sharing one configuration
#[derive(Debug, Clone)]
pub struct LimbSet {
    limbs: Vec<Limb>,
    credit: RepCredit,
    reps: u64,
}

impl LimbSet {
    pub fn new<I, S>(names: I, config: MachineConfig, credit: RepCredit) -> RepsenseResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        config.validate()?;
        let limbs: Vec<Limb> = names
            .into_iter()
            .map(|name| Limb {
                name: name.into(),
                machine: PhaseMachine::new(config.clone()),
                awaiting_partner: false,
            })
            .collect();
        if limbs.is_empty() {
            return Err(RepsenseError::NoLimbs);
        }
        Ok(Self {
            limbs,
            credit,
            reps: 0,
        })
    }

    /// Feed one frame. `signal` yields each limb's input, or `None` when
    /// the limb has no usable signal this frame; such limbs are skipped.
    pub fn update<F>(&mut self, now: FrameTime, mut signal: F) -> LimbUpdate
    where
        F: FnMut(&str) -> Option<PhaseInput>,
    {
        let mut update = LimbUpdate::default();

        for limb in &mut self.limbs {
            let Some(input) = signal(&limb.name) else {
                continue;
            };
            let Some(transition) = limb.machine.update(input, now) else {
                continue;
            };
            if transition.completed {
                match self.credit {
                    RepCredit::Independent => update.credited += 1,
                    RepCredit::Together => limb.awaiting_partner = true,
                }
            }
            update.transitions.push(LimbTransition {
                limb: limb.name.clone(),
                transition,
            });
        }

        if self.credit == RepCredit::Together && self.limbs.iter().all(|l| l.awaiting_partner) {
            for limb in &mut self.limbs {
                limb.awaiting_partner = false;
            }
            update.credited += 1;
        }

        if update.credited > 0 {
            self.reps += update.credited;
            info!(reps = self.reps, credited = update.credited, "repetition credited");
        }
        update
    }

    /// Repetitions credited since creation or the last reset
    pub fn reps(&self) -> u64 {
        self.reps
    }

    /// Phase of the first limb
    pub fn primary_phase(&self) -> Phase {
        self.limbs
            .first()
            .map(|l| l.machine.phase())
            .unwrap_or(Phase::None)
    }

    pub fn phase(&self, limb: &str) -> Option<Phase> {
        self.limbs
            .iter()
            .find(|l| l.name == limb)
            .map(|l| l.machine.phase())
    }

    /// `(limb, phase)` for every limb in configuration order
    pub fn phases(&self) -> Vec<(String, Phase)> {
        self.limbs
            .iter()
            .map(|l| (l.name.clone(), l.machine.phase()))
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.limbs.iter().map(|l| l.name.as_str())
    }

    pub fn credit(&self) -> RepCredit {
        self.credit
    }

    pub fn reset(&mut self) {
        for limb in &mut self.limbs {
            limb.machine.reset();
            limb.awaiting_partner = false;
        }
        self.reps = 0;
    }
}
