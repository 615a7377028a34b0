//! Persistent task list with periodic reminders (§2 "TodoService").

use std::sync::Arc;

use agent_protocol::event::{Event, MonitorEventKind};
use agent_protocol::todo::{TodoItem, TodoStatus};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::event_bus::EventBus;
use crate::message_queue::{MessageKind, MessageQueue, SendOptions};
use crate::store::Store;

pub struct TodoService {
    agent_id: String,
    store: Arc<dyn Store>,
    todos: Mutex<Vec<TodoItem>>,
    reminder_interval_steps: u64,
}

impl TodoService {
    pub async fn load(agent_id: String, store: Arc<dyn Store>, reminder_interval_steps: u64) -> Self {
        let todos = store.load_todos(&agent_id).await.unwrap_or_default();
        Self {
            agent_id,
            store,
            todos: Mutex::new(todos),
            reminder_interval_steps: reminder_interval_steps.max(1),
        }
    }

    pub fn get_todos(&self) -> Vec<TodoItem> {
        self.todos.lock().clone()
    }

    pub async fn set_todos(&self, todos: Vec<TodoItem>) {
        *self.todos.lock() = todos.clone();
        let _ = self.store.save_todos(&self.agent_id, &todos).await;
    }

    pub async fn update_todo(&self, id: Uuid, status: TodoStatus) -> bool {
        let updated = {
            let mut todos = self.todos.lock();
            match todos.iter_mut().find(|t| t.id == id) {
                Some(item) => {
                    item.status = status;
                    true
                }
                None => false,
            }
        };
        if updated {
            let snapshot = self.get_todos();
            let _ = self.store.save_todos(&self.agent_id, &snapshot).await;
        }
        updated
    }

    pub async fn delete_todo(&self, id: Uuid) -> bool {
        let removed = {
            let mut todos = self.todos.lock();
            let before = todos.len();
            todos.retain(|t| t.id != id);
            todos.len() != before
        };
        if removed {
            let snapshot = self.get_todos();
            let _ = self.store.save_todos(&self.agent_id, &snapshot).await;
        }
        removed
    }

    /// Called after every completed step; injects a system reminder into the
    /// message queue on interval boundaries when there are open todos.
    pub async fn notify_step(&self, bus: &EventBus, queue: &MessageQueue, step_count: u64) {
        if step_count % self.reminder_interval_steps != 0 {
            return;
        }
        let open: Vec<TodoItem> = self
            .get_todos()
            .into_iter()
            .filter(|t| t.status != TodoStatus::Completed)
            .collect();
        if open.is_empty() {
            return;
        }
        let lines: Vec<String> = open
            .iter()
            .map(|t| format!("- [{:?}] {}", t.status, t.title))
            .collect();
        queue.send(
            &format!("Open todos:\n{}", lines.join("\n")),
            SendOptions {
                kind: MessageKind::Reminder,
                reminder: None,
                skip_standard_ending: false,
            },
        );
        bus.emit(
            &self.agent_id,
            Event::Monitor(MonitorEventKind::ReminderSent {
                kind: "todo".to_string(),
            }),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn update_todo_persists_status_change() {
        let store = Arc::new(MemoryStore::new());
        let service = TodoService::load("agent-1".into(), store.clone(), 1).await;
        let item = TodoItem::new("write tests");
        let id = item.id;
        service.set_todos(vec![item]).await;

        assert!(service.update_todo(id, TodoStatus::InProgress).await);
        let reloaded = store.load_todos("agent-1").await.unwrap();
        assert_eq!(reloaded[0].status, TodoStatus::InProgress);
    }

    #[tokio::test]
    async fn delete_todo_removes_it() {
        let store = Arc::new(MemoryStore::new());
        let service = TodoService::load("agent-1".into(), store, 1).await;
        let item = TodoItem::new("write tests");
        let id = item.id;
        service.set_todos(vec![item]).await;
        assert!(service.delete_todo(id).await);
        assert!(service.get_todos().is_empty());
    }
}
