//! Event types for the notification system

use std::time::SystemTime;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoaderEventType {
    /// A plugin invalidated cached update information
    UpdatesChanged,
    /// A search was cancelled because a newer one started
    SearchSuperseded,
    /// Plugins were set up and the loader is ready
    Ready,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PluginEventType {
    Registered,
    Initialized,
    /// Setup failed or the plugin opted out; it takes no further part
    Disabled,
    /// Data the plugin serves has changed on disk or remotely
    CacheInvalidated,
    Error,
    Destroyed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SystemEventType {
    Startup,
    Shutdown,
}

#[derive(Clone, Debug)]
pub struct LoaderEvent {
    pub event_type: LoaderEventType,
    pub timestamp: SystemTime,
    pub message: Option<String>,
}

impl LoaderEvent {
    pub fn new(event_type: LoaderEventType) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: None,
        }
    }

    pub fn with_message(event_type: LoaderEventType, message: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: Some(message),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PluginEvent {
    pub event_type: PluginEventType,
    pub timestamp: SystemTime,
    pub plugin_name: String,
    pub message: Option<String>,
}

impl PluginEvent {
    pub fn new(event_type: PluginEventType, plugin_name: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            plugin_name,
            message: None,
        }
    }

    pub fn with_message(event_type: PluginEventType, plugin_name: String, message: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            plugin_name,
            message: Some(message),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SystemEvent {
    pub event_type: SystemEventType,
    pub timestamp: SystemTime,
    pub message: Option<String>,
}

impl SystemEvent {
    pub fn new(event_type: SystemEventType) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: None,
        }
    }

    pub fn with_message(event_type: SystemEventType, message: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: Some(message),
        }
    }
}

/// Unified event enum that encompasses all event types
#[derive(Clone, Debug)]
pub enum Event {
    Loader(LoaderEvent),
    Plugin(PluginEvent),
    System(SystemEvent),
}

impl Event {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Event::Loader(_) => "Loader",
            Event::Plugin(_) => "Plugin",
            Event::System(_) => "System",
        }
    }
}

/// Event filtering options for subscribers
#[derive(Clone, Debug, PartialEq)]
pub enum EventFilter {
    LoaderOnly,
    PluginOnly,
    SystemOnly,
    LoaderAndPlugin,
    All,
}

impl EventFilter {
    /// Check if an event should be accepted by this filter
    pub fn accepts(&self, event: &Event) -> bool {
        matches!(
            (self, event),
            (EventFilter::LoaderOnly, Event::Loader(_))
                | (EventFilter::PluginOnly, Event::Plugin(_))
                | (EventFilter::SystemOnly, Event::System(_))
                | (EventFilter::LoaderAndPlugin, Event::Loader(_))
                | (EventFilter::LoaderAndPlugin, Event::Plugin(_))
                | (EventFilter::All, _)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_event_creation() {
        let event = PluginEvent::new(PluginEventType::Disabled, "fedora-tagger".to_string());
        assert_eq!(event.event_type, PluginEventType::Disabled);
        assert_eq!(event.plugin_name, "fedora-tagger");
        assert!(event.message.is_none());

        let event = PluginEvent::with_message(
            PluginEventType::CacheInvalidated,
            "packagekit".to_string(),
            "packages.json changed".to_string(),
        );
        assert_eq!(event.message.as_deref(), Some("packages.json changed"));
    }

    #[test]
    fn test_event_filter_accepts() {
        let loader = Event::Loader(LoaderEvent::new(LoaderEventType::UpdatesChanged));
        let plugin = Event::Plugin(PluginEvent::new(
            PluginEventType::Registered,
            "steam".to_string(),
        ));
        let system = Event::System(SystemEvent::new(SystemEventType::Shutdown));

        assert!(EventFilter::LoaderOnly.accepts(&loader));
        assert!(!EventFilter::LoaderOnly.accepts(&plugin));
        assert!(!EventFilter::LoaderOnly.accepts(&system));

        assert!(EventFilter::PluginOnly.accepts(&plugin));
        assert!(!EventFilter::PluginOnly.accepts(&loader));

        assert!(EventFilter::SystemOnly.accepts(&system));

        assert!(EventFilter::LoaderAndPlugin.accepts(&loader));
        assert!(EventFilter::LoaderAndPlugin.accepts(&plugin));
        assert!(!EventFilter::LoaderAndPlugin.accepts(&system));

        for event in [&loader, &plugin, &system] {
            assert!(EventFilter::All.accepts(event));
        }
    }

    #[test]
    fn test_event_kind_name() {
        let event = Event::System(SystemEvent::with_message(
            SystemEventType::Startup,
            "starting".to_string(),
        ));
        assert_eq!(event.kind_name(), "System");
    }
}
