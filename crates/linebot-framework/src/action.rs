//! Builders for actions whose postbacks come back to this process.
//!
//! Building a [`PostbackAction`], [`DatetimePickerAction`] or
//! [`RichMenuSwitchAction`] registers its token with the [`Correlation`] registry, so the postback it produces can be
//! routed to a one-shot handler and carry action data.

use serde_json::{Map, Value, json};

use crate::correlation::Correlation;
use crate::handler::{BoxedHandler, Handler, into_handler};

/// What the chat UI does after a postback action is tapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOption {
    /// Close the rich menu.
    CloseRichMenu,
    /// Open the rich menu.
    OpenRichMenu,
    /// Open the keyboard.
    OpenKeyboard,
    /// Open voice input.
    OpenVoice,
}

impl InputOption {
    fn as_str(self) -> &'static str {
        match self {
            Self::CloseRichMenu => "closeRichMenu",
            Self::OpenRichMenu => "openRichMenu",
            Self::OpenKeyboard => "openKeyboard",
            Self::OpenVoice => "openVoice",
        }
    }
}

/// Picker mode of a datetime picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerMode {
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Date and time.
    Datetime,
}

impl PickerMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Time => "time",
            Self::Datetime => "datetime",
        }
    }
}

/// Handler and data shared by the builders.
#[derive(Default)]
struct Registration {
    token: Option<String>,
    handler: Option<BoxedHandler>,
    data: Map<String, Value>,
}

impl Registration {
    fn register(self, correlation: &Correlation) -> String {
        let data = (!self.data.is_empty()).then_some(Value::Object(self.data));
        match self.token {
            Some(token) => {
                correlation.register_token(&token, self.handler, data);
                token
            }
            None => correlation.register(self.handler, data),
        }
    }
}

fn insert_opt(object: &mut Value, key: &str, value: Option<String>) {
    if let Some(value) = value {
        object[key] = Value::String(value);
    }
}

// ============================================================================
// Postback
// ============================================================================

/// A postback action.
#[derive(Default)]
pub struct PostbackAction {
    label: Option<String>,
    display_text: Option<String>,
    input_option: Option<InputOption>,
    fill_in_text: Option<String>,
    registration: Registration,
}

impl PostbackAction {
    /// Creates an action with the given button label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Text sent as the user's message when tapped.
    pub fn display_text(mut self, text: impl Into<String>) -> Self {
        self.display_text = Some(text.into());
        self
    }

    /// UI behaviour after tapping.
    pub fn input_option(mut self, option: InputOption) -> Self {
        self.input_option = Some(option);
        self
    }

    /// Text pre-filled when the keyboard opens.
    pub fn fill_in_text(mut self, text: impl Into<String>) -> Self {
        self.fill_in_text = Some(text.into());
        self
    }

    /// Uses a fixed token instead of a generated one.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.registration.token = Some(token.into());
        self
    }

    /// Adds an entry to the action data.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.registration.data.insert(key.into(), value.into());
        self
    }

    /// Runs `handler` once, on the first postback from this action.
    pub fn handler<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.registration.handler = Some(into_handler(handler));
        self
    }

    /// Registers the action and returns its JSON action object.
    pub fn build(self, correlation: &Correlation) -> Value {
        let token = self.registration.register(correlation);
        let mut action = json!({ "type": "postback", "data": token });
        insert_opt(&mut action, "label", self.label);
        insert_opt(&mut action, "displayText", self.display_text);
        insert_opt(
            &mut action,
            "inputOption",
            self.input_option.map(|o| o.as_str().to_string()),
        );
        insert_opt(&mut action, "fillInText", self.fill_in_text);
        action
    }
}

// ============================================================================
// Datetime picker
// ============================================================================

/// A datetime picker action.
pub struct DatetimePickerAction {
    mode: PickerMode,
    label: Option<String>,
    initial: Option<String>,
    max: Option<String>,
    min: Option<String>,
    registration: Registration,
}

impl DatetimePickerAction {
    /// Creates a picker of the given mode.
    pub fn new(mode: PickerMode) -> Self {
        Self {
            mode,
            label: None,
            initial: None,
            max: None,
            min: None,
            registration: Registration::default(),
        }
    }

    /// Button label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Initially selected value.
    pub fn initial(mut self, value: impl Into<String>) -> Self {
        self.initial = Some(value.into());
        self
    }

    /// Latest selectable value.
    pub fn max(mut self, value: impl Into<String>) -> Self {
        self.max = Some(value.into());
        self
    }

    /// Earliest selectable value.
    pub fn min(mut self, value: impl Into<String>) -> Self {
        self.min = Some(value.into());
        self
    }

    /// Adds an entry to the action data.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.registration.data.insert(key.into(), value.into());
        self
    }

    /// Runs `handler` once, on the first pick.
    pub fn handler<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.registration.handler = Some(into_handler(handler));
        self
    }

    /// Registers the action and returns its JSON action object.
    pub fn build(self, correlation: &Correlation) -> Value {
        let token = self.registration.register(correlation);
        let mut action = json!({
            "type": "datetimepicker",
            "data": token,
            "mode": self.mode.as_str(),
        });
        insert_opt(&mut action, "label", self.label);
        insert_opt(&mut action, "initial", self.initial);
        insert_opt(&mut action, "max", self.max);
        insert_opt(&mut action, "min", self.min);
        action
    }
}

// ============================================================================
// Rich menu switch
// ============================================================================

/// A rich menu switch action. Only valid inside rich menus.
///
/// Its postback arrives as [`EventKind::RichMenuSwitch`] with the selected
/// alias in `params.newRichMenuAliasId`.
///
/// [`EventKind::RichMenuSwitch`]: linebot_core::EventKind::RichMenuSwitch
pub struct RichMenuSwitchAction {
    alias_id: String,
    label: Option<String>,
    registration: Registration,
}

impl RichMenuSwitchAction {
    /// Switches to the rich menu alias `alias_id`.
    pub fn new(alias_id: impl Into<String>) -> Self {
        Self {
            alias_id: alias_id.into(),
            label: None,
            registration: Registration::default(),
        }
    }

    /// Accessibility label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Uses a fixed token instead of a generated one.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.registration.token = Some(token.into());
        self
    }

    /// Adds an entry to the action data.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.registration.data.insert(key.into(), value.into());
        self
    }

    /// Runs `handler` once, on the first switch through this action.
    pub fn handler<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.registration.handler = Some(into_handler(handler));
        self
    }

    /// Registers the action and returns its JSON action object.
    pub fn build(self, correlation: &Correlation) -> Value {
        let token = self.registration.register(correlation);
        let mut action = json!({
            "type": "richmenuswitch",
            "richMenuAliasId": self.alias_id,
            "data": token,
        });
        insert_opt(&mut action, "label", self.label);
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linebot_core::MemoryStore;

    #[test]
    fn postback_action_registers_token() {
        let correlation = Correlation::new(MemoryStore::shared());
        let action = PostbackAction::new("Tea")
            .display_text("I'll have tea")
            .input_option(InputOption::CloseRichMenu)
            .data("drink", "tea")
            .handler(|| async { anyhow::Ok(()) })
            .build(&correlation);

        let token = action["data"].as_str().unwrap();
        assert_eq!(action["type"], "postback");
        assert_eq!(action["label"], "Tea");
        assert_eq!(action["inputOption"], "closeRichMenu");
        assert!(action.get("fillInText").is_none());
        assert!(correlation.has_handler(token));
        assert_eq!(correlation.data(token), Some(json!({ "drink": "tea" })));
    }

    #[test]
    fn picker_without_handler_or_data_registers_nothing() {
        let correlation = Correlation::new(MemoryStore::shared());
        let action = DatetimePickerAction::new(PickerMode::Date)
            .label("When?")
            .min("2024-01-01")
            .build(&correlation);

        assert_eq!(action["type"], "datetimepicker");
        assert_eq!(action["mode"], "date");
        assert_eq!(correlation.pending_handlers(), 0);
        assert_eq!(correlation.data(action["data"].as_str().unwrap()), None);
    }

    #[test]
    fn fixed_token_is_kept() {
        let correlation = Correlation::new(MemoryStore::shared());
        let action = PostbackAction::new("x").token("menu:next").build(&correlation);
        assert_eq!(action["data"], "menu:next");
    }

    #[test]
    fn rich_menu_switch_registers_handler_and_data() {
        let correlation = Correlation::new(MemoryStore::shared());
        let action = RichMenuSwitchAction::new("menu-b")
            .label("Next page")
            .data("page", 2)
            .handler(|| async { anyhow::Ok(()) })
            .build(&correlation);

        let token = action["data"].as_str().unwrap();
        assert_eq!(action["type"], "richmenuswitch");
        assert_eq!(action["richMenuAliasId"], "menu-b");
        assert_eq!(action["label"], "Next page");
        assert!(correlation.has_handler(token));
        assert_eq!(correlation.data(token), Some(json!({ "page": 2 })));

        let bare = RichMenuSwitchAction::new("menu-a").build(&correlation);
        assert!(bare.get("label").is_none());
        assert_eq!(correlation.pending_handlers(), 1);
    }
}
