use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};

/// Supported user languages. Arabic is the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    Ar,
    En,
}

/// Fixed per-locale strings.
pub struct Messages {
    pub welcome: &'static str,
    pub help: &'static str,
    pub version: &'static str,
    pub select_lang: &'static str,
    pub lang_set: &'static str,
    pub unknown: &'static str,
    pub convert_button: &'static str,
    pub language_button: &'static str,
    pub help_button: &'static str,
    pub main_menu_button: &'static str,
}

static AR: Messages = Messages {
    welcome: "👋 أهلاً بك! أرسل لي ملف Word أو Excel أو PowerPoint وسأقوم بتحويله إلى PDF.",
    help: "فقط قم برفع ملف (.docx, .xlsx, .pptx) وسأقوم بتحويله وتحميله لك كملف PDF.",
    version: "🤖 إصدار البوت",
    select_lang: "يرجى اختيار اللغة:",
    lang_set: "تم ضبط اللغة",
    unknown: "❓ لم أفهم هذا الأمر. يرجى استخدام القائمة.",
    convert_button: "📄 تحويل",
    language_button: "🌐 اللغة",
    help_button: "❓ مساعدة",
    main_menu_button: "🏠 القائمة الرئيسية",
};

static EN: Messages = Messages {
    welcome: "👋 Welcome! Send me a Word, Excel, or PowerPoint file and I will convert it to PDF.",
    help: "Just upload a document (.docx, .xlsx, .pptx) and I will convert it to PDF.",
    version: "🤖 Bot Version",
    select_lang: "Please select your language:",
    lang_set: "Language set",
    unknown: "❓ I don't understand that command. Please use the menu.",
    convert_button: "📄 Convert",
    language_button: "🌐 Language",
    help_button: "❓ Help",
    main_menu_button: "🏠 Main Menu",
};

impl Lang {
    pub const ALL: [Lang; 2] = [Lang::Ar, Lang::En];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ar" => Some(Lang::Ar),
            "en" => Some(Lang::En),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Lang::Ar => "ar",
            Lang::En => "en",
        }
    }

    pub fn messages(self) -> &'static Messages {
        match self {
            Lang::Ar => &AR,
            Lang::En => &EN,
        }
    }

    /// Version banner for the /version command.
    pub fn version_text(self) -> String {
        format!(
            "{}: {}\n🛡️ Bridge: Rust (axum)",
            self.messages().version,
            env!("CARGO_PKG_VERSION")
        )
    }
}

/// Persistent reply keyboard shown after /start and language changes.
pub fn main_keyboard(lang: Lang) -> ReplyMarkup {
    let m = lang.messages();
    ReplyMarkup::Keyboard(
        KeyboardMarkup::new(vec![
            vec![
                KeyboardButton::new(m.convert_button),
                KeyboardButton::new(m.language_button),
            ],
            vec![KeyboardButton::new(m.help_button)],
        ])
        .resize_keyboard(),
    )
}

/// Inline picker whose buttons carry `lang_<code>` callback data.
pub fn language_picker() -> ReplyMarkup {
    ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("العربية 🇸🇦", "lang_ar"),
        InlineKeyboardButton::callback("English 🇺🇸", "lang_en"),
    ]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for lang in Lang::ALL {
            assert_eq!(Lang::from_code(lang.code()), Some(lang));
        }
        assert_eq!(Lang::from_code("fr"), None);
        assert_eq!(Lang::default(), Lang::Ar);
    }

    #[test]
    fn test_locales_differ() {
        assert_ne!(Lang::Ar.messages().welcome, Lang::En.messages().welcome);
        assert!(Lang::En.messages().unknown.contains("don't understand"));
    }

    #[test]
    fn test_version_text_has_crate_version() {
        assert!(Lang::En.version_text().contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_language_picker_callback_data() {
        let json = serde_json::to_value(language_picker()).unwrap();
        let buttons = &json["inline_keyboard"][0];
        assert_eq!(buttons[0]["callback_data"], "lang_ar");
        assert_eq!(buttons[1]["callback_data"], "lang_en");
    }

    #[test]
    fn test_main_keyboard_labels() {
        let json = serde_json::to_value(main_keyboard(Lang::En)).unwrap();
        assert_eq!(json["keyboard"][0][0]["text"], "📄 Convert");
        assert_eq!(json["keyboard"][1][0]["text"], "❓ Help");
        assert_eq!(json["resize_keyboard"], true);
    }
}
