//! In-memory host ports used by the tests.

use crate::error::HostError;
use crate::media::{
    AudioConstraints, CaptureContext, MediaDevices, MediaStream, MediaTrack, TrackKind,
};
use crate::rtc::{
    AudioSink, ChannelEvent, DataChannel, DataChannelState, IceGatheringState, PeerConnection,
    PeerConnectionConfig, PeerConnectionFactory, PeerConnectionState, PeerEvent, PlaybackEvent,
    SessionDescription,
};
use crate::transport::{TransportEvent, TransportObserver};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast};

const EVENT_CAPACITY: usize = 64;

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

type Journal = Arc<Mutex<Vec<&'static str>>>;

fn position(journal: &Journal, entry: &str) -> Option<usize> {
    journal.lock().unwrap().iter().position(|e| *e == entry)
}

#[derive(Debug)]
pub struct FakeTrack {
    id: String,
    kind: TrackKind,
    hints: Mutex<Vec<String>>,
    stopped: AtomicBool,
}

impl FakeTrack {
    pub fn audio(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            kind: TrackKind::Audio,
            hints: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn set_content_hint(&self, hint: &str) {
        self.hints.lock().unwrap().push(hint.to_string());
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct FakeStream {
    id: String,
    tracks: Vec<Arc<FakeTrack>>,
}

impl FakeStream {
    pub fn new(id: &str, tracks: Vec<Arc<FakeTrack>>) -> Self {
        Self {
            id: id.to_string(),
            tracks,
        }
    }

    pub fn all_stopped(&self) -> bool {
        self.tracks.iter().all(|track| track.is_stopped())
    }

    /// Content hints applied to the first track.
    pub fn hints(&self) -> Vec<String> {
        self.tracks
            .first()
            .map(|track| track.hints.lock().unwrap().clone())
            .unwrap_or_default()
    }
}

impl MediaStream for FakeStream {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks
            .iter()
            .map(|track| track.clone() as Arc<dyn MediaTrack>)
            .collect()
    }
}

pub struct FakeMediaDevices {
    context: CaptureContext,
    denial: Option<String>,
    gate: Option<Arc<Semaphore>>,
    requests: AtomicUsize,
    constraints: Mutex<Option<AudioConstraints>>,
    streams: Mutex<Vec<Arc<FakeStream>>>,
}

impl FakeMediaDevices {
    pub fn new() -> Self {
        Self {
            context: CaptureContext::SECURE_BROWSER,
            denial: None,
            gate: None,
            requests: AtomicUsize::new(0),
            constraints: Mutex::new(None),
            streams: Mutex::new(Vec::new()),
        }
    }

    pub fn with_context(mut self, context: CaptureContext) -> Self {
        self.context = context;
        self
    }

    pub fn denying(mut self, message: &str) -> Self {
        self.denial = Some(message.to_string());
        self
    }

    /// Holds every capture request until [`FakeMediaDevices::open_gate`] is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1024);
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<AudioConstraints> {
        *self.constraints.lock().unwrap()
    }

    pub fn streams(&self) -> Vec<Arc<FakeStream>> {
        self.streams.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaDevices for FakeMediaDevices {
    fn context(&self) -> CaptureContext {
        self.context
    }

    async fn get_user_media(
        &self,
        constraints: AudioConstraints,
    ) -> Result<Arc<dyn MediaStream>, HostError> {
        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        *self.constraints.lock().unwrap() = Some(constraints);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if let Some(denial) = &self.denial {
            return Err(HostError::new(denial.clone()));
        }

        let stream = Arc::new(FakeStream::new(
            &format!("mic-{request}"),
            vec![FakeTrack::audio(&format!("mic-{request}-audio"))],
        ));
        self.streams.lock().unwrap().push(stream.clone());
        Ok(stream)
    }
}

pub struct FakeDataChannel {
    label: String,
    state: Mutex<DataChannelState>,
    sent: Mutex<Vec<String>>,
    events: broadcast::Sender<ChannelEvent>,
    journal: Journal,
}

impl FakeDataChannel {
    fn new(label: &str, journal: Journal) -> Self {
        Self {
            label: label.to_string(),
            state: Mutex::new(DataChannelState::Connecting),
            sent: Mutex::new(Vec::new()),
            events: broadcast::channel(EVENT_CAPACITY).0,
            journal,
        }
    }

    pub fn open(&self) {
        *self.state.lock().unwrap() = DataChannelState::Open;
        let _ = self.events.send(ChannelEvent::Open);
    }

    pub fn receive(&self, text: &str) {
        let _ = self.events.send(ChannelEvent::Message(text.to_string()));
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl DataChannel for FakeDataChannel {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn ready_state(&self) -> DataChannelState {
        *self.state.lock().unwrap()
    }

    fn send(&self, text: &str) -> Result<(), HostError> {
        if self.ready_state() != DataChannelState::Open {
            return Err(HostError::new("InvalidStateError: data channel is not open"));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state == DataChannelState::Closed {
                return;
            }
            *state = DataChannelState::Closed;
        }
        self.journal.lock().unwrap().push("channel.close");
        let _ = self.events.send(ChannelEvent::Close);
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gathering {
    /// Completes on a spawned task shortly after the local description is set.
    Spawned,
    /// Already complete when `set_local_description` returns.
    Instant,
    /// Waits for [`FakePeerConnection::finish_gathering`].
    Manual,
}

#[derive(Debug, Clone)]
struct PeerBehavior {
    gathering: Gathering,
    auto_connect: bool,
    answer_failure: Option<String>,
}

/// State shared with the tasks a fake peer spawns.
struct PeerShared {
    local: Mutex<Option<SessionDescription>>,
    gathering: Mutex<IceGatheringState>,
    connection: Mutex<PeerConnectionState>,
    closed: AtomicBool,
    events: broadcast::Sender<PeerEvent>,
}

impl PeerShared {
    fn finish_gathering(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        {
            let mut local = self.local.lock().unwrap();
            if let Some(offer) = local.take() {
                *local = Some(SessionDescription::offer(format!(
                    "{}a=candidate:1 1 udp 2122260223 192.0.2.10 50000 typ host\r\na=end-of-candidates\r\n",
                    offer.sdp()
                )));
            }
        }
        let _ = self.events.send(PeerEvent::IceCandidate(Some(
            "candidate:1 1 udp 2122260223 192.0.2.10 50000 typ host".to_string(),
        )));
        *self.gathering.lock().unwrap() = IceGatheringState::Complete;
        let _ = self.events.send(PeerEvent::IceGatheringStateChange(
            IceGatheringState::Complete,
        ));
        let _ = self.events.send(PeerEvent::IceCandidate(None));
    }

    fn set_connection_state(&self, state: PeerConnectionState) {
        *self.connection.lock().unwrap() = state;
        let _ = self.events.send(PeerEvent::ConnectionStateChange(state));
    }
}

pub struct FakePeerConnection {
    config: PeerConnectionConfig,
    behavior: PeerBehavior,
    shared: Arc<PeerShared>,
    journal: Journal,
    labels: Mutex<Vec<String>>,
    channel: Mutex<Option<Arc<FakeDataChannel>>>,
    senders: Mutex<Vec<Arc<dyn MediaTrack>>>,
    remote: Mutex<Option<SessionDescription>>,
}

impl FakePeerConnection {
    fn new(config: PeerConnectionConfig, behavior: PeerBehavior) -> Self {
        Self {
            config,
            behavior,
            shared: Arc::new(PeerShared {
                local: Mutex::new(None),
                gathering: Mutex::new(IceGatheringState::New),
                connection: Mutex::new(PeerConnectionState::New),
                closed: AtomicBool::new(false),
                events: broadcast::channel(EVENT_CAPACITY).0,
            }),
            journal: Arc::new(Mutex::new(Vec::new())),
            labels: Mutex::new(Vec::new()),
            channel: Mutex::new(None),
            senders: Mutex::new(Vec::new()),
            remote: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PeerConnectionConfig {
        &self.config
    }

    pub fn channel_labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }

    pub fn channel(&self) -> Option<Arc<FakeDataChannel>> {
        self.channel.lock().unwrap().clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote.lock().unwrap().clone()
    }

    pub fn has_local_description(&self) -> bool {
        self.shared.local.lock().unwrap().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn channel_created_before_offer(&self) -> bool {
        matches!(
            (position(&self.journal, "channel.create"), position(&self.journal, "offer")),
            (Some(channel), Some(offer)) if channel < offer
        )
    }

    pub fn channel_closed_before_peer(&self) -> bool {
        matches!(
            (position(&self.journal, "channel.close"), position(&self.journal, "peer.close")),
            (Some(channel), Some(peer)) if channel < peer
        )
    }

    pub fn finish_gathering(&self) {
        self.shared.finish_gathering();
    }

    pub fn connect(&self) {
        self.shared.set_connection_state(PeerConnectionState::Connecting);
        self.shared.set_connection_state(PeerConnectionState::Connected);
    }

    pub fn set_connection_state(&self, state: PeerConnectionState) {
        self.shared.set_connection_state(state);
    }

    /// Delivers a remote audio track, optionally grouped in a stream.
    pub fn emit_remote_track(&self, with_stream: bool) {
        let track = FakeTrack::audio("remote-audio");
        let streams: Vec<Arc<dyn MediaStream>> = if with_stream {
            vec![Arc::new(FakeStream::new("remote", vec![track.clone()]))]
        } else {
            vec![]
        };
        let _ = self.shared.events.send(PeerEvent::Track {
            track: track as Arc<dyn MediaTrack>,
            streams,
        });
    }
}

#[async_trait]
impl PeerConnection for FakePeerConnection {
    fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, HostError> {
        self.journal.lock().unwrap().push("channel.create");
        self.labels.lock().unwrap().push(label.to_string());
        let channel = Arc::new(FakeDataChannel::new(label, self.journal.clone()));
        *self.channel.lock().unwrap() = Some(channel.clone());
        Ok(channel)
    }

    fn add_track(
        &self,
        track: Arc<dyn MediaTrack>,
        _stream: Arc<dyn MediaStream>,
    ) -> Result<(), HostError> {
        if self.is_closed() {
            return Err(HostError::new("InvalidStateError: peer connection is closed"));
        }
        self.senders.lock().unwrap().push(track);
        Ok(())
    }

    fn sender_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.senders.lock().unwrap().clone()
    }

    async fn create_offer(&self) -> Result<SessionDescription, HostError> {
        self.journal.lock().unwrap().push("offer");
        Ok(SessionDescription::offer(
            "v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\ns=-\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n",
        ))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), HostError> {
        if self.is_closed() {
            return Err(HostError::new("InvalidStateError: peer connection is closed"));
        }
        *self.shared.local.lock().unwrap() = Some(description);
        *self.shared.gathering.lock().unwrap() = IceGatheringState::Gathering;
        let _ = self.shared.events.send(PeerEvent::IceGatheringStateChange(
            IceGatheringState::Gathering,
        ));

        match self.behavior.gathering {
            Gathering::Instant => self.shared.finish_gathering(),
            Gathering::Spawned => {
                let shared = self.shared.clone();
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    shared.finish_gathering();
                });
            }
            Gathering::Manual => {}
        }
        Ok(())
    }

    fn local_description(&self) -> Option<SessionDescription> {
        self.shared.local.lock().unwrap().clone()
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), HostError> {
        if let Some(failure) = &self.behavior.answer_failure {
            return Err(HostError::new(failure.clone()));
        }
        if self.is_closed() {
            return Err(HostError::new("InvalidStateError: peer connection is closed"));
        }
        *self.remote.lock().unwrap() = Some(description);
        self.journal.lock().unwrap().push("answer");

        if self.behavior.auto_connect {
            let shared = self.shared.clone();
            tokio::spawn(async move {
                shared.set_connection_state(PeerConnectionState::Connecting);
                shared.set_connection_state(PeerConnectionState::Connected);
            });
        }
        Ok(())
    }

    fn ice_gathering_state(&self) -> IceGatheringState {
        *self.shared.gathering.lock().unwrap()
    }

    fn connection_state(&self) -> PeerConnectionState {
        *self.shared.connection.lock().unwrap()
    }

    fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        self.shared.events.subscribe()
    }

    fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.journal.lock().unwrap().push("peer.close");
        // Browsers switch to closed silently, without a state change notification.
        *self.shared.connection.lock().unwrap() = PeerConnectionState::Closed;
    }
}

pub struct FakePeerFactory {
    behavior: PeerBehavior,
    peers: Mutex<Vec<Arc<FakePeerConnection>>>,
}

impl FakePeerFactory {
    pub fn new() -> Self {
        Self {
            behavior: PeerBehavior {
                gathering: Gathering::Spawned,
                auto_connect: false,
                answer_failure: None,
            },
            peers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_instant_gathering(mut self) -> Self {
        self.behavior.gathering = Gathering::Instant;
        self
    }

    pub fn with_manual_gathering(mut self) -> Self {
        self.behavior.gathering = Gathering::Manual;
        self
    }

    /// Reports `Connected` right after the answer is applied.
    pub fn with_auto_connect(mut self) -> Self {
        self.behavior.auto_connect = true;
        self
    }

    pub fn rejecting_answers(mut self, message: &str) -> Self {
        self.behavior.answer_failure = Some(message.to_string());
        self
    }

    pub fn created(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Arc<FakePeerConnection>> {
        self.peers.lock().unwrap().last().cloned()
    }

    pub fn all(&self) -> Vec<Arc<FakePeerConnection>> {
        self.peers.lock().unwrap().clone()
    }
}

impl PeerConnectionFactory for FakePeerFactory {
    fn create(&self, config: &PeerConnectionConfig) -> Result<Arc<dyn PeerConnection>, HostError> {
        let peer = Arc::new(FakePeerConnection::new(config.clone(), self.behavior.clone()));
        self.peers.lock().unwrap().push(peer.clone());
        Ok(peer)
    }
}

pub struct FakeAudioSink {
    attached: Mutex<Option<Arc<dyn MediaStream>>>,
    blocked: AtomicBool,
    playing: AtomicBool,
    plays: AtomicUsize,
    events: broadcast::Sender<PlaybackEvent>,
}

impl FakeAudioSink {
    pub fn new() -> Self {
        Self {
            attached: Mutex::new(None),
            blocked: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            plays: AtomicUsize::new(0),
            events: broadcast::channel(EVENT_CAPACITY).0,
        }
    }

    /// Rejects `play()` until [`FakeAudioSink::allow_autoplay`], like a page without a gesture.
    pub fn blocking_autoplay(self) -> Self {
        self.blocked.store(true, Ordering::SeqCst);
        self
    }

    pub fn allow_autoplay(&self) {
        self.blocked.store(false, Ordering::SeqCst);
    }

    pub fn attached(&self) -> Option<Arc<dyn MediaStream>> {
        self.attached.lock().unwrap().clone()
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// The remote stream ran out, ex: the assistant finished its turn.
    pub fn end(&self) {
        self.playing.store(false, Ordering::SeqCst);
        let _ = self.events.send(PlaybackEvent::Ended);
    }
}

#[async_trait]
impl AudioSink for FakeAudioSink {
    fn attach(&self, stream: Option<Arc<dyn MediaStream>>) {
        *self.attached.lock().unwrap() = stream;
    }

    async fn play(&self) -> Result<(), HostError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.blocked.load(Ordering::SeqCst) {
            return Err(HostError::new(
                "NotAllowedError: play() failed because the user didn't interact with the document first.",
            ));
        }
        self.playing.store(true, Ordering::SeqCst);
        let _ = self.events.send(PlaybackEvent::Playing);
        Ok(())
    }

    fn pause(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(PlaybackEvent::Paused);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<TransportEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<TransportEvent> {
        self.events.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, predicate: impl Fn(&TransportEvent) -> bool) {
        eventually(|| self.events.lock().unwrap().iter().any(&predicate)).await;
    }
}

impl TransportObserver for RecordingObserver {
    fn on_event(&self, event: TransportEvent) {
        self.events.lock().unwrap().push(event);
    }
}
