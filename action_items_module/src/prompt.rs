//! Instruction prompt for action item extraction.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// System persona for chat-style backends.
pub const SYSTEM_PROMPT: &str = "당신은 대화에서 액션 아이템을 추출하는 전문가입니다.";

/// Marker that ends the prompt; the model continues after it.
pub const OUTPUT_MARKER: &str = "### **출력** :";

/// Asia/Seoul has no daylight saving, so a fixed +09:00 offset is exact.
const SEOUL_UTC_OFFSET_SECS: i32 = 9 * 3600;

pub fn seoul_offset() -> FixedOffset {
    FixedOffset::east_opt(SEOUL_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Calendar date in Seoul at the given instant.
pub fn seoul_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&seoul_offset()).date_naive()
}

/// Render the extraction prompt for a transcript.
///
/// Each item is requested as `- [담당자]: [할 일] (마감 기한: YYYY-MM-DD)`,
/// with `미정` as the assignee when it cannot be determined.
pub fn build_prompt(today: NaiveDate, transcript: &str) -> String {
    format!(
        r#"아래는 Slack 대화입니다. 이 대화에서 참가자가 해야 할 일을 명확하게 정리해 주세요.

### **지침** :
**할 일 목록 작성**  
   - 각 할 일은 담당자, 구체적인 작업 내용, 마감 기한(있는 경우 포함)을 포함해야 합니다.  
   - 형식: `- [담당자]: [구체적인 할 일] (마감 기한: YYYY-MM-DD)`  
   - 담당자가 명확하지 않을 경우 `미정`으로 표시하세요.  

### **출력 형식** :
- [담당자]: [할 일 내용] (마감 기한: YYYY-MM-DD)
- [담당자]: [할 일 내용] (마감 기한: YYYY-MM-DD)

### **대화내용** :
날짜: {today}
{transcript}

{marker}
"#,
        today = today.format("%Y-%m-%d"),
        transcript = transcript,
        marker = OUTPUT_MARKER,
    )
}
