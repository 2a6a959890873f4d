use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::draw::DrawPass;

/// Replays a draw pass onto the overlay canvas. Fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CanvasOperation {
    Draw(DrawPass),
}

impl Operation for CanvasOperation {
    type Output = ();
}

pub struct Canvas<Ev> {
    context: CapabilityContext<CanvasOperation, Ev>,
}

impl<Ev> Capability<Ev> for Canvas<Ev> {
    type Operation = CanvasOperation;
    type MappedSelf<MappedEv> = Canvas<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Canvas::new(self.context.map_event(f))
    }
}

impl<Ev> Canvas<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<CanvasOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn draw(&self, pass: DrawPass) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(CanvasOperation::Draw(pass)).await;
        });
    }
}
