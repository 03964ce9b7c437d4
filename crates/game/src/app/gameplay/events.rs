use gem_engine::{EntityId, LabStatus, Position, QuestStatus, State};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Alert,
}

/// Outbound notifications. Consumers only read them after the tick that
/// produced them has finished.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    EntityCreated {
        id: EntityId,
        type_name: String,
    },
    EntityDestroyed {
        id: EntityId,
    },
    PositionChanged {
        id: EntityId,
        from: Position,
        to: Position,
    },
    GemStateChanged {
        id: EntityId,
        state: State,
    },
    GemStopped {
        id: EntityId,
    },
    GemItemsChanged {
        id: EntityId,
    },
    TileDestroyed {
        id: EntityId,
        position: Position,
    },
    TileRestored {
        id: EntityId,
        position: Position,
    },
    Message {
        level: MessageLevel,
        text: String,
    },
    AdminItemsChanged,
    LabUpdated {
        name: String,
        status: LabStatus,
        progress: u32,
        duration: u32,
    },
    QuestUpdated {
        name: String,
        status: QuestStatus,
    },
}

impl SimEvent {
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            Self::Message {
                level: MessageLevel::Alert,
                ..
            }
        )
    }
}

#[derive(Debug, Default)]
pub struct EventQueue {
    current_tick_events: Vec<SimEvent>,
}

impl EventQueue {
    pub fn emit(&mut self, event: SimEvent) {
        self.current_tick_events.push(event);
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.emit(SimEvent::Message {
            level: MessageLevel::Info,
            text: text.into(),
        });
    }

    pub fn alert(&mut self, text: impl Into<String>) {
        self.emit(SimEvent::Message {
            level: MessageLevel::Alert,
            text: text.into(),
        });
    }

    pub fn iter_emitted_so_far(&self) -> impl Iterator<Item = &SimEvent> {
        self.current_tick_events.iter()
    }

    pub fn len(&self) -> usize {
        self.current_tick_events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current_tick_events.is_empty()
    }

    pub fn drain_current_tick(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.current_tick_events)
    }
}
