//! # Strategy Report
//!
//! Second model call: the merged table goes in as CSV, a Markdown report comes
//! out. The reply is returned verbatim; its structure is not checked.

use tracing::info;

use crate::error::InsightResult;
use crate::model::{Part, VisionModel};
use crate::table::Table;

/// Placeholder replaced by the CSV-serialized merged table.
pub const DATA_PLACEHOLDER: &str = "{data_csv}";

const PERSONA_AGE_PLACEHOLDER: &str = "{persona_age}";
const SLOGAN_MAX_PLACEHOLDER: &str = "{slogan_max}";

/// Age every concept brief must cast its model at.
pub const PERSONA_AGE: u32 = 8;

/// Longest slogan the briefs may propose, in characters.
pub const SLOGAN_MAX_CHARS: u32 = 20;

/// Report instruction. Part one is attribution analysis, part two is exactly
/// three design briefs, each cast with a [`PERSONA_AGE`]-year-old pupil and
/// capped at [`SLOGAN_MAX_CHARS`] slogan characters.
pub const REPORT_PROMPT: &str = r#"
你是一席首席增长官 (CGO) 兼 创意总监。请根据这份【海报视觉特征-转化数据表】撰写执行报告。

数据表如下：
{data_csv}

请输出以下两部分内容：

### 第一部分：📊 数据归因洞察
* 简要分析哪些视觉元素（颜色、模特表情、场景）带来了高转化。

### 第二部分：🚀 下一步行动指令 (Actionable Design Briefs)
请策划 **3个** 具体的裂变海报主题方案。

⚠️ **人物设定强制约束**：
**所有方案中的【人物设定】必须固定为：{persona_age}岁左右的小学生（具体的性别、发型、服饰可变，但年龄感必须一致）。**

#### 方案 A (稳健型 - 复刻高转化特征)
* **📸 背景图拍摄/生图提示词**：
    * **人物设定**：(必须是{persona_age}岁左右孩子，描述其具体的穿着、发型)
    * **场景与光影**：(描述具体的环境、光线方向)
    * **动作与神态**：(描述具体的动作，如拿书、大笑、奔跑)
* **✨ 装饰元素建议**：(例如：涂鸦风格的星星、手绘线条、特定的图标)
* **✍️ 推荐文案 ({slogan_max}字内)**：(一句符合该场景和情绪的短文案，例如：“2026，让成长的每一步都算数！”)

#### 方案 B (创新型 - 尝试新风格)
* **📸 背景图拍摄/生图提示词**：(请提供一套全新的、与方案A截然不同的人物、场景、动作描述，人物仍为{persona_age}岁)
* **✨ 装饰元素建议**：(匹配该新风格的元素)
* **✍️ 推荐文案 ({slogan_max}字内)**：(一句配合该新风格的文案)

#### 方案 C (特定场景/节日型)
* **📸 背景图拍摄/生图提示词**：(针对即将到来的节日或特定学习场景的详细画面描述，人物为{persona_age}岁)
* **✨ 装饰元素建议**：(匹配的氛围元素)
* **✍️ 推荐文案 ({slogan_max}字内)**：(强相关文案)
"#;

/// Embed the table, serialized as CSV without an index column, into the template.
pub fn build_report_prompt(table: &Table) -> InsightResult<String> {
    let data_csv = table.to_csv()?;
    Ok(REPORT_PROMPT
        .replace(PERSONA_AGE_PLACEHOLDER, &PERSONA_AGE.to_string())
        .replace(SLOGAN_MAX_PLACEHOLDER, &SLOGAN_MAX_CHARS.to_string())
        .replacen(DATA_PLACEHOLDER, &data_csv, 1))
}

/// Ask the model for the strategy report on `table`.
pub fn generate_report<M: VisionModel + ?Sized>(
    model: &M,
    model_id: &str,
    table: &Table,
) -> InsightResult<String> {
    let prompt = build_report_prompt(table)?;
    info!(rows = table.len(), prompt_len = prompt.len(), "requesting strategy report");
    model.generate(model_id, &[Part::Text(prompt)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::error::InsightError;

    struct Recorder {
        calls: RefCell<Vec<(String, Vec<Part>)>>,
        reply: Option<String>,
    }

    impl VisionModel for Recorder {
        fn generate(&self, model: &str, parts: &[Part]) -> InsightResult<String> {
            self.calls.borrow_mut().push((model.to_string(), parts.to_vec()));
            self.reply
                .clone()
                .ok_or(InsightError::Api { status: 500, body: "boom".into() })
        }
    }

    fn table() -> Table {
        let mut t = Table::new(vec!["filename".into(), "main_color".into(), "Clicks".into()]);
        t.push_row(vec![Some("a.png".into()), Some("红色系".into()), Some("10".into())]);
        t.push_row(vec![Some("b.png".into()), Some("冷白系".into()), None]);
        t
    }

    #[test]
    fn test_prompt_embeds_csv_verbatim() {
        let prompt = build_report_prompt(&table()).unwrap();
        assert!(prompt.contains("filename,main_color,Clicks\na.png,红色系,10\nb.png,冷白系,\n"));
        assert!(!prompt.contains(DATA_PLACEHOLDER));
    }

    #[test]
    fn test_prompt_fixes_persona_and_three_briefs() {
        let prompt = build_report_prompt(&table()).unwrap();
        assert!(prompt.contains("8岁左右的小学生"));
        assert_eq!(prompt.matches("(20字内)").count(), 3);
        assert!(!prompt.contains(PERSONA_AGE_PLACEHOLDER));
        assert!(!prompt.contains(SLOGAN_MAX_PLACEHOLDER));
        for brief in ["方案 A", "方案 B", "方案 C"] {
            assert!(REPORT_PROMPT.contains(brief));
        }
        assert!(!REPORT_PROMPT.contains("方案 D"));
    }

    #[test]
    fn test_reply_is_returned_verbatim_in_one_text_call() {
        let model = Recorder {
            calls: RefCell::new(Vec::new()),
            reply: Some("## 报告\n\n  内容  ".into()),
        };
        let report = generate_report(&model, "models/gemini-1.5-flash", &table()).unwrap();
        assert_eq!(report, "## 报告\n\n  内容  ");

        let calls = model.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "models/gemini-1.5-flash");
        assert!(matches!(calls[0].1.as_slice(), [Part::Text(_)]));
    }

    #[test]
    fn test_failure_is_surfaced_without_retry() {
        let model = Recorder {
            calls: RefCell::new(Vec::new()),
            reply: None,
        };
        let err = generate_report(&model, "m", &table()).unwrap_err();
        assert_eq!(err.category(), "api");
        assert_eq!(model.calls.borrow().len(), 1);
    }
}
