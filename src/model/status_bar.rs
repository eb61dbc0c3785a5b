#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    MessageChanged { label: String, message: String },
    ErrorMessageChanged { label: String, message: String },
    MessageCleared,
}

/// A single transient line shown under the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBar {
    notice: Option<Notice>,
}

impl StatusBar {
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.notice.as_ref().map(|notice| notice.text.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.notice.as_ref().is_some_and(|notice| notice.is_error)
    }

    fn set_notice(&mut self, label: String, message: String, is_error: bool) {
        let normalized_message = message.replace('\n', " ");
        self.notice = Some(Notice {
            text: format!("[{label}] {normalized_message}"),
            is_error,
        });
    }

    pub fn update(&mut self, message: Message) {
        match message {
            Message::MessageChanged { label, message } => self.set_notice(label, message, false),
            Message::ErrorMessageChanged { label, message } => {
                self.set_notice(format!("ERR: {label}"), message, true)
            }
            Message::MessageCleared => {
                self.notice = None;
            }
        }
    }
}
