use crate::time_zone::zone_label;

pub const DEFAULT_MESSAGE_FORMAT: &str = "{{ &local.label }} {{ local.shortTime }}, {{# timeZones }}{{ &label }} {{ shortTime }}{{^ last }}, {{/ last }}{{/ timeZones }}";

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TimeZoneEntry {
    pub label: String,
    pub time_zone: String,
}

impl TimeZoneEntry {
    pub fn new(time_zone: &str) -> Self {
        Self {
            label: zone_label(time_zone),
            time_zone: time_zone.to_string(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ApplicationState {
    pub user_label: String,
    pub time_zones: Vec<TimeZoneEntry>,
    pub message_format: String,
    pub custom_date_time: Option<String>,
}

impl Default for ApplicationState {
    fn default() -> Self {
        Self {
            user_label: String::new(),
            time_zones: Vec::new(),
            message_format: DEFAULT_MESSAGE_FORMAT.to_string(),
            custom_date_time: None,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Command {
    AddTimeZone(String),
    RenameEntry { index: usize, label: String },
    DeleteEntry(usize),
    SetUserLabel(String),
    SetMessageFormat(String),
    SetCustomDateTime { enabled: bool, value: Option<String> },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Effect {
    Persist,
    Transient,
    Unchanged,
}

impl ApplicationState {
    pub fn apply(&mut self, command: Command) -> Effect {
        match command {
            Command::AddTimeZone(time_zone) => self.add_time_zone(&time_zone),
            Command::RenameEntry { index, label } => self.rename_entry(index, label),
            Command::DeleteEntry(index) => self.delete_entry(index),
            Command::SetUserLabel(label) => self.set_user_label(label),
            Command::SetMessageFormat(format) => self.set_message_format(format),
            Command::SetCustomDateTime { enabled, value } => {
                self.set_custom_date_time(enabled, value)
            }
        }
    }

    pub fn add_time_zone(&mut self, time_zone: &str) -> Effect {
        self.time_zones.push(TimeZoneEntry::new(time_zone));
        Effect::Persist
    }

    pub fn rename_entry(&mut self, index: usize, label: String) -> Effect {
        match self.time_zones.get_mut(index) {
            Some(entry) => {
                entry.label = label;
                Effect::Persist
            }
            None => Effect::Unchanged,
        }
    }

    pub fn delete_entry(&mut self, index: usize) -> Effect {
        if index >= self.time_zones.len() {
            return Effect::Unchanged;
        }
        self.time_zones.remove(index);
        Effect::Persist
    }

    pub fn set_user_label(&mut self, label: String) -> Effect {
        self.user_label = label;
        Effect::Persist
    }

    pub fn set_message_format(&mut self, format: String) -> Effect {
        self.message_format = format;
        Effect::Persist
    }

    pub fn set_custom_date_time(&mut self, enabled: bool, value: Option<String>) -> Effect {
        self.custom_date_time = match value {
            Some(value) if enabled && !value.is_empty() => Some(value),
            _ => None,
        };
        Effect::Transient
    }
}
