//! Mock effect handlers for deterministic testing
//!
//! Uses `std::sync::Mutex`: critical sections are short and never held
//! across an await.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sshproxy_core::crypto::openssh;
use sshproxy_core::effects::{
    CryptoEffects, LeadershipEffects, RemoteExecutorEffects, StatusEffects, StorageEffects,
};
use sshproxy_effects::MemoryStorageHandler;
use sshproxy_core::{
    CommandOutput, Keypair, ProxyError, ProxyResult, RemoteTarget, UnitId, UnitStatus,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Crypto
// ============================================================================

#[derive(Debug)]
struct CryptoState {
    rng: ChaCha20Rng,
    generated: usize,
    fail: bool,
}

/// Seeded ed25519 key generation with a generation counter
#[derive(Debug, Clone)]
pub struct MockCryptoHandler {
    state: Arc<Mutex<CryptoState>>,
}

impl MockCryptoHandler {
    /// Generator seeded with `seed`
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            state: Arc::new(Mutex::new(CryptoState {
                rng: ChaCha20Rng::from_seed(seed),
                generated: 0,
                fail: false,
            })),
        }
    }

    /// Generator with a fixed all-zero seed
    pub fn deterministic() -> Self {
        Self::with_seed([42; 32])
    }

    /// Number of keypairs generated so far
    pub fn generation_count(&self) -> usize {
        lock(&self.state).generated
    }

    /// Make every following generation fail (or succeed again)
    pub fn set_failing(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }
}

#[async_trait]
impl CryptoEffects for MockCryptoHandler {
    async fn generate_ssh_keypair(&self, comment: &str) -> ProxyResult<Keypair> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(ProxyError::key_generation("mock entropy source failure"));
        }

        let mut seed = [0u8; 32];
        state.rng.fill_bytes(&mut seed);
        let check = state.rng.next_u32();
        state.generated += 1;

        let signing = SigningKey::from_bytes(&seed);
        let public = openssh::public_key_line(&signing.verifying_key(), comment);
        let private = openssh::private_key_pem(&signing, comment, check);
        Ok(Keypair::new(public, private.as_bytes()))
    }
}

// ============================================================================
// Leadership
// ============================================================================

#[derive(Debug, Default)]
struct LeaderState {
    leader: Option<UnitId>,
    queries: u64,
    failover: Option<(u64, Option<UnitId>)>,
}

/// Cluster-wide record of who leads, shared by every unit's handler.
///
/// A failover can be scheduled to happen after an exact number of
/// leadership queries, which is how tests move leadership between two
/// steps of a single handler.
#[derive(Debug, Clone, Default)]
pub struct LeaderRegistry {
    state: Arc<Mutex<LeaderState>>,
}

impl LeaderRegistry {
    /// Registry with `leader` in office
    pub fn new(leader: Option<UnitId>) -> Self {
        Self {
            state: Arc::new(Mutex::new(LeaderState {
                leader,
                ..LeaderState::default()
            })),
        }
    }

    /// Current leader, if any
    pub fn leader(&self) -> Option<UnitId> {
        lock(&self.state).leader.clone()
    }

    /// Move leadership now, cancelling any scheduled failover
    pub fn set_leader(&self, leader: Option<UnitId>) {
        let mut state = lock(&self.state);
        tracing::debug!(?leader, "Leadership moved");
        state.leader = leader;
        state.failover = None;
    }

    /// Move leadership to `to` once `after` more queries have been answered
    pub fn schedule_failover(&self, after: u64, to: Option<UnitId>) {
        let mut state = lock(&self.state);
        let at = state.queries + after;
        state.failover = Some((at, to));
    }

    /// Total leadership queries answered
    pub fn query_count(&self) -> u64 {
        lock(&self.state).queries
    }

    /// Leadership handler for `unit` backed by this registry
    pub fn handler(&self, unit: UnitId) -> MockLeadershipHandler {
        MockLeadershipHandler {
            registry: self.clone(),
            unit,
        }
    }

    fn query(&self, unit: &UnitId) -> bool {
        let mut state = lock(&self.state);
        let answer = state.leader.as_ref() == Some(unit);
        state.queries += 1;
        let due = matches!(&state.failover, Some((at, _)) if state.queries >= *at);
        if due {
            if let Some((_, to)) = state.failover.take() {
                state.leader = to;
            }
        }
        answer
    }
}

/// One unit's view of a [`LeaderRegistry`]
#[derive(Debug, Clone)]
pub struct MockLeadershipHandler {
    registry: LeaderRegistry,
    unit: UnitId,
}

#[async_trait]
impl LeadershipEffects for MockLeadershipHandler {
    async fn is_leader(&self) -> bool {
        self.registry.query(&self.unit)
    }
}

// ============================================================================
// Remote executor
// ============================================================================

/// How [`MockRemoteExecutor`] answers credential checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyBehavior {
    /// Credentials are accepted
    Accept,
    /// Credentials are rejected
    Reject,
    /// Fail with a remote error carrying this message
    Fail(String),
}

#[derive(Debug)]
struct RemoteState {
    verify: VerifyBehavior,
    output: CommandOutput,
    commands: Vec<(RemoteTarget, String)>,
    verifications: usize,
}

/// Scripted remote host that records every command it is asked to run
#[derive(Debug, Clone)]
pub struct MockRemoteExecutor {
    state: Arc<Mutex<RemoteState>>,
}

impl Default for MockRemoteExecutor {
    fn default() -> Self {
        Self::new(VerifyBehavior::Accept)
    }
}

impl MockRemoteExecutor {
    /// Executor answering verifications with `verify`
    pub fn new(verify: VerifyBehavior) -> Self {
        Self {
            state: Arc::new(Mutex::new(RemoteState {
                verify,
                output: CommandOutput::success(""),
                commands: Vec::new(),
                verifications: 0,
            })),
        }
    }

    /// Change how verification answers
    pub fn set_verify(&self, verify: VerifyBehavior) {
        lock(&self.state).verify = verify;
    }

    /// Output returned by every following `run`
    pub fn set_output(&self, output: CommandOutput) {
        lock(&self.state).output = output;
    }

    /// Commands run so far, oldest first
    pub fn commands(&self) -> Vec<String> {
        lock(&self.state)
            .commands
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }

    /// Number of verifications attempted
    pub fn verification_count(&self) -> usize {
        lock(&self.state).verifications
    }
}

#[async_trait]
impl RemoteExecutorEffects for MockRemoteExecutor {
    async fn run(&self, target: &RemoteTarget, command: &str) -> ProxyResult<CommandOutput> {
        let mut state = lock(&self.state);
        state.commands.push((target.clone(), command.to_string()));
        Ok(state.output.clone())
    }

    async fn verify_credentials(&self, _target: &RemoteTarget) -> ProxyResult<bool> {
        let mut state = lock(&self.state);
        state.verifications += 1;
        match &state.verify {
            VerifyBehavior::Accept => Ok(true),
            VerifyBehavior::Reject => Ok(false),
            VerifyBehavior::Fail(message) => Err(ProxyError::remote(message.clone())),
        }
    }
}

// ============================================================================
// Crashes
// ============================================================================

#[derive(Debug, Default)]
struct CrashState {
    remaining: Option<usize>,
    crashed: bool,
}

/// Simulated process death at an exact storage write.
///
/// Once armed, the switch lets a number of further writes through and then
/// fails every write and status update until it is reset, so a handler is
/// cut off between two writes with nothing after the cut becoming visible.
#[derive(Debug, Clone, Default)]
pub struct CrashSwitch {
    state: Arc<Mutex<CrashState>>,
}

impl CrashSwitch {
    /// Create a new instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Die after `writes` more successful writes
    pub fn arm(&self, writes: usize) {
        *lock(&self.state) = CrashState {
            remaining: Some(writes),
            crashed: false,
        };
    }

    /// Bring the process back
    pub fn reset(&self) {
        *lock(&self.state) = CrashState::default();
    }

    /// Whether the armed crash has fired
    pub fn has_crashed(&self) -> bool {
        lock(&self.state).crashed
    }

    fn before_write(&self) -> ProxyResult<()> {
        let mut state = lock(&self.state);
        if state.crashed {
            return Err(ProxyError::storage("simulated crash"));
        }
        let remaining = state.remaining;
        match remaining {
            Some(0) => {
                state.crashed = true;
                Err(ProxyError::storage("simulated crash"))
            }
            Some(n) => {
                state.remaining = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Memory storage whose writes stop at a [`CrashSwitch`]
#[derive(Debug, Clone)]
pub struct CrashingStorage {
    inner: MemoryStorageHandler,
    crash: CrashSwitch,
}

impl CrashingStorage {
    /// Wrap `inner` behind `crash`
    pub fn new(inner: MemoryStorageHandler, crash: CrashSwitch) -> Self {
        Self { inner, crash }
    }
}

#[async_trait]
impl StorageEffects for CrashingStorage {
    async fn store(&self, key: &str, value: Vec<u8>) -> ProxyResult<()> {
        self.crash.before_write()?;
        self.inner.store(key, value).await
    }

    async fn retrieve(&self, key: &str) -> ProxyResult<Option<Vec<u8>>> {
        self.inner.retrieve(key).await
    }

    async fn remove(&self, key: &str) -> ProxyResult<bool> {
        self.crash.before_write()?;
        self.inner.remove(key).await
    }

    async fn exists(&self, key: &str) -> ProxyResult<bool> {
        self.inner.exists(key).await
    }
}

// ============================================================================
// Status
// ============================================================================

/// Status sink keeping the full history
#[derive(Debug, Clone, Default)]
pub struct MockStatusHandler {
    history: Arc<Mutex<Vec<UnitStatus>>>,
    crash: CrashSwitch,
}

impl MockStatusHandler {
    /// Create a new instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Status sink that stops recording while `crash` has fired
    pub fn with_crash_switch(crash: CrashSwitch) -> Self {
        Self {
            history: Arc::default(),
            crash,
        }
    }

    /// Every status set, oldest first
    pub fn history(&self) -> Vec<UnitStatus> {
        lock(&self.history).clone()
    }

    /// Most recent status
    pub fn current(&self) -> Option<UnitStatus> {
        lock(&self.history).last().cloned()
    }
}

#[async_trait]
impl StatusEffects for MockStatusHandler {
    async fn set_status(&self, status: UnitStatus) -> ProxyResult<()> {
        if self.crash.has_crashed() {
            return Err(ProxyError::storage("simulated crash"));
        }
        lock(&self.history).push(status);
        Ok(())
    }

    async fn status(&self) -> ProxyResult<Option<UnitStatus>> {
        Ok(self.current())
    }
}
