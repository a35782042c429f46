pub const EXTRACT_SYSTEM: &str = "You are an information extraction system. \
You respond only with a single valid JSON object and never guess missing values.";

pub const EXTRACT_PROMPT_TEMPLATE: &str = r#"Extract the following fields from the input text:

- job_role: job title or role
- job_description: the full job description text
- company_name: company name
- company_description: what the company does, if stated
- final_date: last date to apply, if mentioned

RULES:
1. Respond ONLY with valid JSON, no markdown fences, no explanation.
2. Do NOT guess missing values. If a field is not present, use null.
3. job_description must contain the full job description text.
4. final_date must be in ISO format (YYYY-MM-DD).

Return JSON with exactly these keys:
{"job_role": string|null, "job_description": string|null, "company_name": string|null, "company_description": string|null, "final_date": string|null}

INPUT TEXT:
{input_text}"#;
