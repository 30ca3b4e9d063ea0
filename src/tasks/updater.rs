//! Single producer of a task's event stream.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::a2a::{Artifact, Message, Part, TaskEvent, TaskState};
use crate::error::OrchestrationError;

#[derive(Debug)]
struct Progress {
    state: TaskState,
    announced: bool,
}

/// Emits the lifecycle events of one task, in order.
///
/// The channel is unbounded so emission never waits for the consumer.
/// Every emission is checked against the lifecycle: anything after a
/// terminal event is refused and nothing is sent.
#[derive(Debug)]
pub struct TaskUpdater {
    task_id: String,
    context_id: String,
    tx: mpsc::UnboundedSender<TaskEvent>,
    progress: Mutex<Progress>,
}

impl TaskUpdater {
    pub fn new(task_id: impl Into<String>, context_id: impl Into<String>, tx: mpsc::UnboundedSender<TaskEvent>) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            tx,
            progress: Mutex::new(Progress {
                state: TaskState::Submitted,
                announced: false,
            }),
        }
    }

    /// Create an updater together with the receiving end of its stream.
    pub fn channel(
        task_id: impl Into<String>,
        context_id: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(task_id, context_id, tx), rx)
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// State of the last emitted event.
    pub fn state(&self) -> TaskState {
        self.progress.lock().state
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Announce the task as submitted. Only valid before anything else.
    pub fn submit(&self) -> Result<(), OrchestrationError> {
        let mut progress = self.progress.lock();
        if progress.announced {
            return Err(self.illegal(progress.state, TaskState::Submitted));
        }
        progress.announced = true;
        self.send(TaskState::Submitted, None, None);
        Ok(())
    }

    /// Announce that processing has started.
    pub fn start_work(&self, message: Option<Message>) -> Result<(), OrchestrationError> {
        self.emit(TaskState::Working, message, None)
    }

    /// Publish an intermediate status.
    pub fn update_status(&self, state: TaskState, message: Message) -> Result<(), OrchestrationError> {
        self.emit(state, Some(message), None)
    }

    /// Finish the task with an artifact made of `parts`.
    pub fn complete(&self, parts: Vec<Part>) -> Result<(), OrchestrationError> {
        let artifact = Artifact::new(parts).named("result");
        self.emit(TaskState::Completed, None, Some(artifact))
    }

    /// Finish the task as failed with a descriptive message.
    pub fn fail(&self, reason: impl Into<String>) -> Result<(), OrchestrationError> {
        self.emit(TaskState::Failed, Some(self.agent_message(reason)), None)
    }

    /// An agent message tagged with this task's identifiers.
    pub fn agent_message(&self, text: impl Into<String>) -> Message {
        Message::agent_text(text).with_ids(self.task_id.clone(), self.context_id.clone())
    }

    fn emit(&self, state: TaskState, message: Option<Message>, artifact: Option<Artifact>) -> Result<(), OrchestrationError> {
        let mut progress = self.progress.lock();
        if !progress.state.can_transition_to(state) {
            return Err(self.illegal(progress.state, state));
        }
        progress.state = state;
        progress.announced = true;
        // Sent under the lock so concurrent emitters cannot reorder events.
        self.send(state, message, artifact);
        Ok(())
    }

    fn send(&self, state: TaskState, message: Option<Message>, artifact: Option<Artifact>) {
        let event = TaskEvent::new(self.task_id.clone(), self.context_id.clone(), state, message, artifact);
        if self.tx.send(event).is_err() {
            log::debug!("Event consumer for task {} is gone; dropping {} event", self.task_id, state);
        }
    }

    fn illegal(&self, from: TaskState, to: TaskState) -> OrchestrationError {
        log::warn!("Refusing {} -> {} for task {}", from, to, self.task_id);
        OrchestrationError::IllegalTransition {
            task_id: self.task_id.clone(),
            from,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<TaskEvent>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_happy_path_order() {
        let (updater, mut rx) = TaskUpdater::channel("t", "c");
        updater.submit().unwrap();
        updater.start_work(None).unwrap();
        updater.update_status(TaskState::Working, updater.agent_message("calling tool")).unwrap();
        updater.complete(vec![Part::text("approved")]).unwrap();

        let states: Vec<TaskState> = drain(&mut rx).iter().map(|e| e.state).collect();
        assert_eq!(
            states,
            vec![TaskState::Submitted, TaskState::Working, TaskState::Working, TaskState::Completed]
        );
    }

    #[test]
    fn test_nothing_after_terminal() {
        let (updater, mut rx) = TaskUpdater::channel("t", "c");
        updater.submit().unwrap();
        updater.start_work(None).unwrap();
        updater.fail("boom").unwrap();

        assert!(updater.update_status(TaskState::Working, updater.agent_message("late")).is_err());
        assert!(updater.complete(vec![Part::text("late")]).is_err());
        assert!(updater.fail("again").is_err());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        let last = events.last().unwrap();
        assert!(last.is_final);
        assert!(last.artifact.is_none());
        assert_eq!(last.message.as_ref().unwrap().text(), "boom");
    }

    #[test]
    fn test_complete_requires_working() {
        let (updater, _rx) = TaskUpdater::channel("t", "c");
        updater.submit().unwrap();
        let err = updater.complete(vec![Part::text("x")]).unwrap_err();
        assert!(matches!(err, OrchestrationError::IllegalTransition { .. }));
        assert!(updater.submit().is_err());
    }

    #[test]
    fn test_emission_survives_dropped_consumer() {
        let (updater, rx) = TaskUpdater::channel("t", "c");
        drop(rx);
        updater.submit().unwrap();
        updater.start_work(None).unwrap();
        assert!(updater.complete(vec![Part::text("done")]).is_ok());
        assert!(updater.is_terminal());
    }
}
