use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};

pub type BlockedFuture = Shared<BoxFuture<'static, ()>>;

/// Whether an operator can make progress. `NotBlocked` carries no allocation;
/// `Waiting` resolves once progress may be possible again.
#[derive(Clone, Default)]
pub enum Blocked {
    #[default]
    NotBlocked,
    Waiting(BlockedFuture),
}

pub const NOT_BLOCKED: Blocked = Blocked::NotBlocked;

impl Blocked {
    pub fn waiting<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Blocked::Waiting(future.boxed().shared())
    }

    pub fn is_blocked(&self) -> bool {
        match self {
            Blocked::NotBlocked => false,
            Blocked::Waiting(future) => future.peek().is_none(),
        }
    }

    /// Resolves when the first of `items` resolves. Not blocked if any is.
    pub fn any<I>(items: I) -> Blocked
    where
        I: IntoIterator<Item = Blocked>,
    {
        let mut waiting = Vec::new();
        for item in items {
            match item {
                Blocked::NotBlocked => return Blocked::NotBlocked,
                Blocked::Waiting(future) if future.peek().is_some() => {
                    return Blocked::NotBlocked;
                }
                Blocked::Waiting(future) => waiting.push(future),
            }
        }
        match waiting.len() {
            0 => Blocked::NotBlocked,
            1 => waiting.pop().map(Blocked::Waiting).unwrap_or_default(),
            _ => Blocked::waiting(async move {
                futures::future::select_all(waiting).await;
            }),
        }
    }

    pub async fn wait(self) {
        if let Blocked::Waiting(future) = self {
            future.await;
        }
    }
}

impl fmt::Debug for Blocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blocked::NotBlocked => f.write_str("NotBlocked"),
            Blocked::Waiting(_) if !self.is_blocked() => f.write_str("Waiting(done)"),
            Blocked::Waiting(_) => f.write_str("Waiting"),
        }
    }
}

/// A one-time signal whose waiters are released by `set`. Dropping it also
/// releases them.
pub struct SettableBlocked {
    sender: Option<oneshot::Sender<()>>,
    future: BlockedFuture,
}

impl SettableBlocked {
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel::<()>();
        Self {
            sender: Some(sender),
            future: receiver.map(|_| ()).boxed().shared(),
        }
    }

    pub fn blocked(&self) -> Blocked {
        Blocked::Waiting(self.future.clone())
    }

    pub fn is_set(&self) -> bool {
        self.sender.is_none()
    }

    pub fn set(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(());
        }
    }
}

impl Default for SettableBlocked {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SettableBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettableBlocked")
            .field("set", &self.is_set())
            .finish()
    }
}
