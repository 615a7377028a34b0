//! Timer/step-count triggers producing monitor events (§2 "Scheduler").

use agent_protocol::event::{Event, MonitorEventKind};

use crate::event_bus::EventBus;

pub struct Scheduler {
    step_interval: u64,
}

impl Scheduler {
    pub fn new(step_interval: u64) -> Self {
        Self {
            step_interval: step_interval.max(1),
        }
    }

    /// Called by the loop after every completed step; emits a
    /// `scheduler_triggered` monitor event on interval boundaries.
    pub async fn notify_step(&self, bus: &EventBus, agent_id: &str, step_count: u64) {
        if step_count % self.step_interval == 0 {
            bus.emit(
                agent_id,
                Event::Monitor(MonitorEventKind::SchedulerTriggered {
                    reason: format!("step_count={step_count}"),
                }),
            )
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn triggers_only_on_interval_boundary() {
        let bus = EventBus::new(Arc::new(MemoryStore::new()));
        let scheduler = Scheduler::new(3);
        scheduler.notify_step(&bus, "agent-1", 1).await;
        scheduler.notify_step(&bus, "agent-1", 2).await;
        assert_eq!(bus.current_seq(), 0);
        scheduler.notify_step(&bus, "agent-1", 3).await;
        assert_eq!(bus.current_seq(), 1);
    }
}
