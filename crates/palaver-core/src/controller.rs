//! The chat controller: binds the visible transcript to the session store
//! and the live channel.
//!
//! The controller is owned by a single event loop. Inbound frames are pulled
//! with [`ChatController::next_inbound`], so no view state is shared across
//! tasks.

use palaver_channel::{ChannelClient, Subscription};
use palaver_session::{ChatSession, SessionId, SessionStore, StoreError};
use palaver_types::{AuthUser, ChatMessage};

/// An inbound subscription tied to the session it records into.
struct InboundBinding {
    session_id: SessionId,
    subscription: Subscription,
}

/// Write-through view over the session store plus the live channel.
pub struct ChatController {
    store: SessionStore,
    channel: ChannelClient,
    channel_url: String,
    sessions: Vec<ChatSession>,
    active: Option<SessionId>,
    transcript: Vec<ChatMessage>,
    inbound: Option<InboundBinding>,
}

impl ChatController {
    pub fn new(store: SessionStore, channel: ChannelClient, channel_url: impl Into<String>) -> Self {
        Self {
            store,
            channel,
            channel_url: channel_url.into(),
            sessions: Vec::new(),
            active: None,
            transcript: Vec::new(),
            inbound: None,
        }
    }

    /// Sessions visible in this run, in creation order.
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.active
    }

    /// Transcript of the active session.
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn channel(&self) -> &ChannelClient {
        &self.channel
    }

    /// Open a fresh session and connect the channel.
    ///
    /// Does nothing once a session is active.
    pub async fn start(&mut self) -> Result<(), StoreError> {
        self.start_with(None).await
    }

    /// Like [`ChatController::start`], but reopens session `resume` when it
    /// exists instead of creating a new one.
    pub async fn start_with(&mut self, resume: Option<SessionId>) -> Result<(), StoreError> {
        if self.active.is_some() {
            return Ok(());
        }

        let mut sessions = self.store.list_sessions();
        let existing = resume.and_then(|id| sessions.iter().find(|s| s.id == id).cloned());
        let session = match existing {
            Some(session) => session,
            None => {
                if let Some(id) = resume {
                    tracing::warn!("Session {id} not found; starting a new one");
                }
                let session = self.store.create_session()?;
                sessions.push(session.clone());
                session
            }
        };

        self.sessions = sessions;
        self.transcript = session.messages;
        self.activate(session.id);

        let url = self.channel_url.clone();
        self.channel.connect(&url).await;
        Ok(())
    }

    /// Send `text` as `user` in the active session.
    ///
    /// Returns `None` without doing anything when the text is blank, no
    /// session is active, or nobody is logged in. The message is recorded
    /// locally even if the channel drops it.
    pub fn send_message(&mut self, user: Option<&AuthUser>, text: &str) -> Option<ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }
        let session_id = self.active?;
        let user = user?;

        let message = ChatMessage::outbound(&user.username, text);
        self.channel.send(text);
        self.record(session_id, message.clone());
        Some(message)
    }

    /// Wait for the next inbound frame and record it in the bound session.
    ///
    /// Pending forever while no session is active. Cancel safe.
    pub async fn next_inbound(&mut self) -> Option<ChatMessage> {
        let Some(binding) = self.inbound.as_mut() else {
            return std::future::pending().await;
        };
        let session_id = binding.session_id;
        let text = binding.subscription.recv().await?;
        let message = ChatMessage::inbound(text);
        self.record(session_id, message.clone());
        Some(message)
    }

    /// Make `id` the active session and load its persisted transcript.
    ///
    /// Returns whether the session exists; an unknown id still becomes
    /// active with an empty transcript.
    pub fn switch_session(&mut self, id: SessionId) -> bool {
        self.activate(id);
        match self.store.get_session(id) {
            Some(session) => {
                self.transcript = session.messages;
                true
            }
            None => {
                self.transcript.clear();
                false
            }
        }
    }

    /// Create a session, make it active, and clear the transcript.
    pub fn new_session(&mut self) -> Result<ChatSession, StoreError> {
        let session = self.store.create_session()?;
        self.sessions.push(session.clone());
        self.activate(session.id);
        self.transcript.clear();
        Ok(session)
    }

    /// Drop the inbound subscription and close the channel.
    ///
    /// Frames already delivered to the subscription are recorded first.
    pub async fn shutdown(&mut self) {
        self.unbind();
        self.channel.close().await;
    }

    /// Set the active id, rebinding the inbound subscription when it changes.
    fn activate(&mut self, id: SessionId) {
        let unchanged = self.active == Some(id) && self.inbound.is_some();
        if unchanged {
            return;
        }
        self.unbind();
        self.active = Some(id);
        self.inbound = Some(InboundBinding {
            session_id: id,
            subscription: self.channel.subscribe(),
        });
    }

    /// Record every frame the current subscription already holds into its
    /// session, then unsubscribe.
    fn unbind(&mut self) {
        let Some(mut previous) = self.inbound.take() else {
            return;
        };
        let mut drained = 0usize;
        while let Some(text) = previous.subscription.try_recv() {
            self.record(previous.session_id, ChatMessage::inbound(text));
            drained += 1;
        }
        tracing::debug!(
            "Unbinding inbound frames from session {} ({drained} pending recorded)",
            previous.session_id
        );
        previous.subscription.unsubscribe();
    }

    /// Append to the visible transcript and write through to the store.
    fn record(&mut self, session_id: SessionId, message: ChatMessage) {
        if self.active == Some(session_id) {
            self.transcript.push(message.clone());
        }
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) {
            session.messages.push(message.clone());
        }
        if let Err(e) = self.store.append_message(session_id, message) {
            tracing::warn!("Failed to save message to session {session_id}: {e}");
        }
    }
}
