use crate::infrastructure::error::{CliError, Result};
use instant::Duration;
use pairchat_core::{EngineConfig, Phase};
use pairchat_rtc::{Switchboard, UserIntent};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

const ALICE: &str = "alice";
const BOB: &str = "bob";

/// Scripted two-client runs over the loopback switchboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Search, accept on both sides, connect
    HappyPath,
    /// Bob skips the proposed match
    Skip,
    /// Alice ends a running chat
    HangUp,
    /// The link drops once and the automatic retry recovers it
    LinkDrop,
    /// The link never comes back; Alice gives up after the last retry
    RetryExhausted,
    /// Bob loses the signaling connection mid-chat
    PeerDisconnect,
}

impl Scenario {
    pub fn all() -> [Scenario; 6] {
        [
            Scenario::HappyPath,
            Scenario::Skip,
            Scenario::HangUp,
            Scenario::LinkDrop,
            Scenario::RetryExhausted,
            Scenario::PeerDisconnect,
        ]
    }

    /// Phase Alice must end in
    pub fn expected(&self) -> &'static str {
        match self {
            Scenario::HappyPath | Scenario::LinkDrop => "connected",
            Scenario::Skip => "matched",
            Scenario::HangUp | Scenario::RetryExhausted | Scenario::PeerDisconnect => "idle",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scenario::HappyPath => "happy-path",
            Scenario::Skip => "skip",
            Scenario::HangUp => "hang-up",
            Scenario::LinkDrop => "link-drop",
            Scenario::RetryExhausted => "retry-exhausted",
            Scenario::PeerDisconnect => "peer-disconnect",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub action: String,
    pub elapsed_ms: u64,
    pub phases: BTreeMap<String, Phase>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: Scenario,
    pub steps: Vec<StepReport>,
    /// Signaling events each client emitted, oldest first
    pub emitted: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl SimulationReport {
    pub fn final_phase(&self, client: &str) -> Option<&Phase> {
        self.steps.last().and_then(|step| step.phases.get(client))
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scenario: {}", self.scenario)?;
        for step in &self.steps {
            let phases = step
                .phases
                .iter()
                .map(|(client, phase)| format!("{}={}", client, phase.name()))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "  [{:>6} ms] {:<32} {}", step.elapsed_ms, step.action, phases)?;
        }
        for (client, events) in &self.emitted {
            writeln!(f, "  {} emitted: {}", client, events.join(", "))?;
        }
        for line in &self.trace {
            writeln!(f, "    {}", line)?;
        }
        Ok(())
    }
}

/// Runs one `Scenario` and records the phases after every step
pub struct Simulator {
    board: Switchboard,
    scenario: Scenario,
    steps: Vec<StepReport>,
    trace: Vec<String>,
    keep_trace: bool,
    first_retry: Duration,
}

impl Simulator {
    pub fn new(config: EngineConfig, scenario: Scenario) -> Result<Self> {
        config.validate()?;
        let first_retry = config.retry_policy().delay_for(0);
        let mut board = Switchboard::new(config);
        board.add_client(ALICE, "Alice")?;
        board.add_client(BOB, "Bob")?;

        Ok(Self {
            board,
            scenario,
            steps: Vec::new(),
            trace: Vec::new(),
            keep_trace: false,
            first_retry,
        })
    }

    /// Include every relayed signal in the report
    pub fn with_trace(mut self) -> Self {
        self.keep_trace = true;
        self
    }

    pub fn run(mut self) -> Result<SimulationReport> {
        tracing::info!("🎬 Running scenario {}", self.scenario);
        let started = self.board.now();
        self.record("start", started);

        match self.scenario {
            Scenario::HappyPath => {
                self.chat(started)?;
            }
            Scenario::Skip => {
                self.search(started)?;
                self.intent(BOB, UserIntent::Skip, started)?;
            }
            Scenario::HangUp => {
                self.chat(started)?;
                self.intent(ALICE, UserIntent::HangUp, started)?;
            }
            Scenario::LinkDrop => {
                self.chat(started)?;
                self.board.drop_link(ALICE)?;
                self.record("link dropped", started);
                self.board.advance(self.first_retry);
                self.record("retry timer fired", started);
            }
            Scenario::RetryExhausted => {
                self.chat(started)?;
                self.board.set_auto_connect(ALICE, false)?;
                self.board.set_auto_connect(BOB, false)?;
                self.board.drop_link(ALICE)?;
                self.record("link dropped", started);
                while self.board.advance_to_next_deadline() {
                    self.record("deadline", started);
                }
                self.intent(ALICE, UserIntent::Dismiss, started)?;
            }
            Scenario::PeerDisconnect => {
                self.chat(started)?;
                self.board.disconnect(BOB)?;
                self.record("bob disconnected", started);
            }
        }

        let mut emitted = BTreeMap::new();
        for id in [ALICE, BOB] {
            emitted.insert(id.to_string(), self.board.emitted(id)?);
        }

        let report = SimulationReport {
            scenario: self.scenario,
            steps: self.steps,
            emitted,
            trace: self.trace,
        };

        let phase = report
            .final_phase(ALICE)
            .map(|phase| phase.name())
            .unwrap_or("unknown");
        if phase != self.scenario.expected() {
            return Err(CliError::ScenarioMismatch {
                scenario: self.scenario.to_string(),
                phase: phase.to_string(),
                expected: self.scenario.expected().to_string(),
            });
        }

        tracing::info!("✅ Scenario {} ended in {}", self.scenario, phase);
        Ok(report)
    }

    fn search(&mut self, started: instant::Instant) -> Result<()> {
        self.intent(ALICE, UserIntent::StartSearch, started)?;
        self.intent(BOB, UserIntent::StartSearch, started)
    }

    fn chat(&mut self, started: instant::Instant) -> Result<()> {
        self.search(started)?;
        self.intent(ALICE, UserIntent::Accept, started)?;
        self.intent(BOB, UserIntent::Accept, started)
    }

    fn intent(&mut self, id: &str, intent: UserIntent, started: instant::Instant) -> Result<()> {
        let action = format!("{} {:?}", id, intent);
        self.board.intent(id, intent)?;
        self.record(&action, started);
        Ok(())
    }

    fn record(&mut self, action: &str, started: instant::Instant) {
        let mut phases = BTreeMap::new();
        for id in self.board.client_ids() {
            if let Ok(engine) = self.board.engine(id.as_str()) {
                phases.insert(id.to_string(), engine.phase().clone());
            }
        }

        let log = self.board.take_log();
        if self.keep_trace {
            self.trace.extend(log);
        }

        self.steps.push(StepReport {
            action: action.to_string(),
            elapsed_ms: (self.board.now() - started).as_millis() as u64,
            phases,
        });
    }
}
