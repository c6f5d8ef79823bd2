//! UI strings by dotted key (e.g. `common.newChat`) for English and Chinese.
//! Missing keys come back as the key itself; unknown languages use English.

const EN: &[(&str, &str)] = &[
    ("common.settings", "Settings"),
    ("common.api", "API"),
    ("common.about", "About"),
    ("common.newChat", "New Chat"),
    ("common.close", "Close"),
    ("common.save", "Save"),
    ("common.cancel", "Cancel"),
    ("common.rename", "Rename"),
    ("common.delete", "Delete"),
    ("settings.commonSettings", "Common Settings"),
    ("settings.language", "Language"),
    ("settings.theme", "Theme"),
    ("settings.light", "Light"),
    ("settings.dark", "Dark"),
    ("settings.apiProviders", "API Providers"),
    ("settings.apiKey", "API Key"),
    ("settings.apiUrl", "API URL"),
    ("settings.model", "Model"),
    ("settings.selectModel", "Select a model"),
    ("settings.testConnection", "Test Connection"),
    ("settings.testing", "Testing..."),
    ("settings.viewApiDocs", "View API Documentation"),
    ("chat.error", "Error"),
    ("chat.session", "Session"),
    ("sessions.none", "No sessions"),
    ("sessions.notFound", "Session not found"),
    ("connection.ok", "Connection OK"),
    ("connection.failed", "Connection failed"),
];

const ZH: &[(&str, &str)] = &[
    ("common.settings", "设置"),
    ("common.api", "API"),
    ("common.about", "关于"),
    ("common.newChat", "新对话"),
    ("common.close", "关闭"),
    ("common.save", "保存"),
    ("common.cancel", "取消"),
    ("common.rename", "重命名"),
    ("common.delete", "删除"),
    ("settings.commonSettings", "通用设置"),
    ("settings.language", "语言"),
    ("settings.theme", "主题"),
    ("settings.light", "浅色"),
    ("settings.dark", "深色"),
    ("settings.apiProviders", "API 提供商"),
    ("settings.apiKey", "API 密钥"),
    ("settings.apiUrl", "API 地址"),
    ("settings.model", "模型"),
    ("settings.selectModel", "选择模型"),
    ("settings.testConnection", "测试连接"),
    ("settings.testing", "测试中..."),
    ("settings.viewApiDocs", "查看 API 文档"),
    ("chat.error", "错误"),
    ("chat.session", "会话"),
    ("sessions.none", "暂无会话"),
    ("sessions.notFound", "未找到会话"),
    ("connection.ok", "连接成功"),
    ("connection.failed", "连接失败"),
];

fn table(language: &str) -> &'static [(&'static str, &'static str)] {
    match language.trim().to_lowercase().as_str() {
        "zh" | "zh-cn" | "zh_cn" => ZH,
        _ => EN,
    }
}

/// Look up `key` for `language`; the key itself when there is no translation.
pub fn translate<'a>(language: &str, key: &'a str) -> &'a str {
    match table(language).iter().find(|(k, _)| *k == key) {
        Some((_, v)) => *v,
        None => key,
    }
}

/// Translator bound to one language.
#[derive(Debug, Clone)]
pub struct Translator {
    language: String,
}

impl Translator {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn t<'a>(&self, key: &'a str) -> &'a str {
        translate(&self.language, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_dotted_keys() {
        assert_eq!(translate("en", "common.newChat"), "New Chat");
        assert_eq!(translate("zh", "settings.testConnection"), "测试连接");
    }

    #[test]
    fn missing_key_falls_back_to_key() {
        assert_eq!(translate("en", "common.unknown"), "common.unknown");
        assert_eq!(translate("zh", "common"), "common");
    }

    #[test]
    fn unknown_language_uses_english() {
        assert_eq!(Translator::new("fr").t("common.save"), "Save");
    }

    #[test]
    fn tables_have_same_keys() {
        let en: Vec<_> = EN.iter().map(|(k, _)| *k).collect();
        let zh: Vec<_> = ZH.iter().map(|(k, _)| *k).collect();
        assert_eq!(en, zh);
    }
}
