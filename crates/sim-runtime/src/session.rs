//! Per-session engines for front-ends that host several games at once.
//!
//! The registry is owned by the caller (a request handler, a UI shell). Each
//! session holds its own engine behind its own mutex, so rounds in one session
//! never wait on another.

use crate::engine::{EngineError, RankedResult, SimulationEngine, SimulationState};
use serde::{Deserialize, Serialize};
use sim_core::{Allocations, GameConfig, PriceChanges};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::info;

/// Opaque session key, e.g. a browser session cookie.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    /// A previous holder panicked mid-update.
    #[error("session lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type SessionHandle = Arc<Mutex<SimulationEngine>>;

/// Isolated engines keyed by session.
pub struct SessionRegistry {
    config: GameConfig,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    /// New sessions start from `config`, which is validated up front.
    pub fn new(config: GameConfig) -> Result<Self, EngineError> {
        sim_core::validate_config(&config)?;
        Ok(Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Handle to the session's engine, creating a fresh game if needed.
    pub fn open(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        if let Some(h) = self
            .sessions
            .read()
            .map_err(|_| SessionError::Poisoned)?
            .get(id)
        {
            return Ok(Arc::clone(h));
        }
        let mut map = self.sessions.write().map_err(|_| SessionError::Poisoned)?;
        if let Some(h) = map.get(id) {
            return Ok(Arc::clone(h));
        }
        let engine = SimulationEngine::new(self.config.clone())?;
        let handle = Arc::new(Mutex::new(engine));
        map.insert(id.clone(), Arc::clone(&handle));
        info!(session = %id, "session opened");
        Ok(handle)
    }

    fn get(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .map_err(|_| SessionError::Poisoned)?
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSession(id.clone()))
    }

    fn with_engine<T>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut SimulationEngine) -> Result<T, EngineError>,
    ) -> Result<T, SessionError> {
        let handle = self.get(id)?;
        let mut engine = handle.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(f(&mut *engine)?)
    }

    pub fn advance(
        &self,
        id: &SessionId,
        changes: &PriceChanges,
        allocations: &Allocations,
    ) -> Result<RankedResult, SessionError> {
        self.with_engine(id, |e| e.advance_round(changes, allocations))
    }

    pub fn reset(&self, id: &SessionId) -> Result<(), SessionError> {
        self.with_engine(id, |e| {
            e.reset();
            Ok(())
        })
    }

    pub fn state(&self, id: &SessionId) -> Result<SimulationState, SessionError> {
        self.with_engine(id, |e| Ok(e.current_state()))
    }

    /// Drop a session. Returns whether it existed.
    pub fn close(&self, id: &SessionId) -> Result<bool, SessionError> {
        let removed = self
            .sessions
            .write()
            .map_err(|_| SessionError::Poisoned)?
            .remove(id)
            .is_some();
        if removed {
            info!(session = %id, "session closed");
        }
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize, SessionError> {
        Ok(self.sessions.read().map_err(|_| SessionError::Poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, SessionError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::thread;

    fn sid(s: &str) -> SessionId {
        SessionId(s.to_string())
    }

    fn flat(cfg: &GameConfig) -> PriceChanges {
        PriceChanges::from_pairs(cfg.commodities.iter().map(|c| (c.clone(), Decimal::ZERO)))
    }

    #[test]
    fn sessions_are_isolated() {
        let cfg = GameConfig::default();
        let reg = SessionRegistry::new(cfg.clone()).unwrap();
        reg.open(&sid("a")).unwrap();
        reg.open(&sid("b")).unwrap();
        reg.advance(&sid("a"), &flat(&cfg), &Allocations::new()).unwrap();
        assert_eq!(reg.state(&sid("a")).unwrap().period, 2);
        assert_eq!(reg.state(&sid("b")).unwrap().period, 1);
        reg.reset(&sid("a")).unwrap();
        assert_eq!(reg.state(&sid("a")).unwrap().period, 1);
    }

    #[test]
    fn open_is_idempotent_and_close_forgets() {
        let reg = SessionRegistry::new(GameConfig::default()).unwrap();
        let h1 = reg.open(&sid("x")).unwrap();
        let h2 = reg.open(&sid("x")).unwrap();
        assert!(Arc::ptr_eq(&h1, &h2));
        assert_eq!(reg.len(), Ok(1));
        assert!(reg.close(&sid("x")).unwrap());
        assert!(!reg.close(&sid("x")).unwrap());
        assert_eq!(reg.is_empty(), Ok(true));
        assert_eq!(
            reg.state(&sid("x")),
            Err(SessionError::UnknownSession(sid("x")))
        );
    }

    #[test]
    fn engine_errors_pass_through() {
        let cfg = GameConfig {
            total_periods: 1,
            ..GameConfig::default()
        };
        let reg = SessionRegistry::new(cfg.clone()).unwrap();
        reg.open(&sid("s")).unwrap();
        reg.advance(&sid("s"), &flat(&cfg), &Allocations::new()).unwrap();
        assert_eq!(
            reg.advance(&sid("s"), &flat(&cfg), &Allocations::new()),
            Err(SessionError::Engine(EngineError::SimulationComplete {
                total_periods: 1
            }))
        );
    }

    #[test]
    fn poisoned_registry_is_reported() {
        let reg = Arc::new(SessionRegistry::new(GameConfig::default()).unwrap());
        let poisoner = Arc::clone(&reg);
        let _ = thread::spawn(move || {
            let _guard = poisoner.sessions.write().unwrap();
            panic!("poison the registry");
        })
        .join();
        assert_eq!(reg.len(), Err(SessionError::Poisoned));
        assert_eq!(reg.is_empty(), Err(SessionError::Poisoned));
        assert_eq!(reg.open(&sid("a")).err(), Some(SessionError::Poisoned));
    }

    #[test]
    fn concurrent_sessions_do_not_interfere() {
        let cfg = GameConfig {
            total_periods: 10,
            ..GameConfig::default()
        };
        let reg = Arc::new(SessionRegistry::new(cfg.clone()).unwrap());
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let reg = Arc::clone(&reg);
                let cfg = cfg.clone();
                thread::spawn(move || {
                    let id = sid(&format!("s{i}"));
                    reg.open(&id).unwrap();
                    for _ in 0..=i {
                        reg.advance(&id, &flat(&cfg), &Allocations::new()).unwrap();
                    }
                    reg.state(&id).unwrap()
                })
            })
            .collect();
        for (i, w) in workers.into_iter().enumerate() {
            let state = w.join().unwrap();
            assert_eq!(state.rounds_played as usize, i + 1);
        }
        assert_eq!(reg.len(), Ok(4));
    }
}
