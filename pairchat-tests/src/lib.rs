use cucumber::World;
use pairchat_core::{EngineConfig, MatchState, Phase};
use pairchat_rtc::{EngineNotice, LoopbackEngine, Switchboard, UserIntent};
use std::collections::HashMap;
use std::fmt;

/// Scenario state: a loopback switchboard and the users on it
#[derive(World, Default)]
pub struct ChatWorld {
    /// Configuration used when the switchboard is created
    pub config: EngineConfig,

    /// The system under test, created by the first "online" step
    pub board: Option<Switchboard>,

    /// Display name → client id
    pub users: HashMap<String, String>,

    /// Notices collected per display name since the last check
    pub notices: HashMap<String, Vec<EngineNotice>>,
}

impl fmt::Debug for ChatWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut phases = HashMap::new();
        if let Some(board) = &self.board {
            for (name, id) in &self.users {
                if let Ok(engine) = board.engine(id) {
                    phases.insert(name.clone(), engine.phase().clone());
                }
            }
        }
        f.debug_struct("ChatWorld")
            .field("profile", &self.config.profile)
            .field("users", &self.users)
            .field("phases", &phases)
            .finish()
    }
}

impl ChatWorld {
    /// Bring a user online, creating the switchboard on first use
    pub fn add_user(&mut self, name: &str) {
        let id = name.to_lowercase();
        let config = self.config.clone();
        let board = self.board.get_or_insert_with(|| Switchboard::new(config));
        board
            .add_client(&id, name)
            .unwrap_or_else(|e| panic!("Failed to add {}: {}", name, e));
        self.users.insert(name.to_string(), id);
    }

    pub fn id(&self, name: &str) -> String {
        self.users
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("User '{}' is not online", name))
    }

    pub fn board(&self) -> &Switchboard {
        self.board.as_ref().expect("No users online yet")
    }

    pub fn board_mut(&mut self) -> &mut Switchboard {
        self.board.as_mut().expect("No users online yet")
    }

    pub fn intent(&mut self, name: &str, intent: UserIntent) {
        let id = self.id(name);
        self.board_mut()
            .intent(&id, intent)
            .unwrap_or_else(|e| panic!("Intent for {} failed: {}", name, e));
        self.collect_notices();
    }

    pub fn engine(&self, name: &str) -> &LoopbackEngine {
        let id = self.id(name);
        self.board()
            .engine(&id)
            .unwrap_or_else(|e| panic!("No engine for {}: {}", name, e))
    }

    pub fn state(&self, name: &str) -> MatchState {
        self.engine(name).state()
    }

    pub fn phase(&self, name: &str) -> Phase {
        self.engine(name).phase().clone()
    }

    pub fn emitted(&self, name: &str, event: &str) -> usize {
        let id = self.id(name);
        self.board()
            .count_emitted(&id, event)
            .unwrap_or_else(|e| panic!("No client for {}: {}", name, e))
    }

    /// Move every pending notice into `notices`
    pub fn collect_notices(&mut self) {
        let users: Vec<(String, String)> = self
            .users
            .iter()
            .map(|(name, id)| (name.clone(), id.clone()))
            .collect();
        for (name, id) in users {
            let drained = self.board_mut().drain_notices(&id).unwrap_or_default();
            self.notices.entry(name).or_default().extend(drained);
        }
    }

    /// System messages shown to `name` so far
    pub fn messages(&self, name: &str) -> Vec<String> {
        self.notices
            .get(name)
            .map(|notices| {
                notices
                    .iter()
                    .filter_map(|notice| match notice {
                        EngineNotice::SystemMessage(text) => Some(text.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
