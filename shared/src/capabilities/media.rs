use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::model::ImageRef;

/// Object-URL housekeeping on the shell side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaOperation {
    Revoke { image: ImageRef },
}

impl Operation for MediaOperation {
    type Output = ();
}

pub struct Media<Ev> {
    context: CapabilityContext<MediaOperation, Ev>,
}

impl<Ev> Capability<Ev> for Media<Ev> {
    type Operation = MediaOperation;
    type MappedSelf<MappedEv> = Media<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Media::new(self.context.map_event(f))
    }
}

impl<Ev> Media<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<MediaOperation, Ev>) -> Self {
        Self { context }
    }

    /// Lets the shell free a handle nothing refers to any more.
    pub fn revoke(&self, image: ImageRef) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(MediaOperation::Revoke { image }).await;
        });
    }
}
