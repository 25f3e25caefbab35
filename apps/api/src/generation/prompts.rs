//! Renders the instruction text for each generation call.
//!
//! Every builder is a pure function of its inputs. Layout of every prompt:
//! header (role + job description) → record dump → optional priority-override
//! block → numbered rules → output schema → JSON-only instruction.

use crate::generation::content::{ContentId, ExperienceRecord, ProjectRecord, SkillGroup};
use crate::generation::skills::{CloudMention, ExperienceHighlights, ProjectHighlights};
use crate::llm_client::prompts::{priority_override_block, JSON_ONLY_INSTRUCTION};

/// System persona for experience rewriting.
pub const EXPERIENCE_SYSTEM: &str = "You are an expert resume writer specializing in ATS \
    optimization and technical resume enhancement.";

/// System persona for project rewriting.
pub const PROJECT_SYSTEM: &str = "You are an expert resume writer specializing in ATS \
    optimization and technical resume enhancement for projects.";

/// System persona for skill optimization.
pub const SKILL_SYSTEM: &str = "You are an ATS optimization specialist. Focus on job description \
    keywords, preserve existing relevant skills, and use specific tool names only. Keep each skill \
    category within 100-120 characters total. Follow cloud platform detection rules and avoid \
    generic terms.";

/// One record as presented to the model: its content id, requested bullet count and data.
#[derive(Debug, Clone, Copy)]
pub struct PromptEntry<'a, T> {
    pub content_id: ContentId,
    pub bullets: u32,
    pub record: &'a T,
}

const EXPERIENCE_RULES: &str = r#"
Requirements for the bullet points:
1. Use the structure: What + How + Why/Impact, except the first bullet of each experience, which is a clear, high-level summary of the experience written as a resume bullet.
2. Incorporate relevant keywords and skills from the job description to maximize ATS scoring, but only where they make sense.
3. Do not repeat any single skill more than 4 times across all experiences.
4. Each bullet point must contain at least 25-30 words, and all bullets must stay within the same rough length.
5. Include clear, quantifiable outcomes (numbers, percentages, time saved, revenue impact, scale, reliability).
6. Add missing but relevant skills and tools from the job description by credibly mapping them onto the candidate's existing responsibilities.
7. Generate exactly the number of bullet points given by "Bullet Points Needed" for each experience, no more and no less. If it is 0, still return that experience with an empty "resume_points" array.
8. Use strong action verbs, quantifiable metrics and business impact in a professional resume style.
9. Transform generic tasks into role-specific, outcome-driven achievements aligned to the target job.
10. CRITICAL: Preserve the core use cases and business contexts of each original experience. Do NOT invent new projects; build on the existing explanation.
11. Return every experience listed above exactly once, using its numeric ID as "experience_id".
"#;

const EXPERIENCE_OUTPUT_FORMAT: &str = r#"
Output format (valid JSON only):
[
  {
    "experience_id": 1,
    "experience_role": "role title tailored to the target job",
    "resume_points": ["bullet_point_1", "bullet_point_2"]
  }
]
"#;

const PROJECT_RULES: &str = r#"
REQUIREMENTS:
1. PRESERVE each project's use case and business context. Do NOT change what the project is about.
2. UPDATE skills to match the job requirements: replace irrelevant skills with job-relevant ones.
3. Bullets follow a What + How + Why/Impact structure.
4. Each bullet has at least 15-20 words.
5. Include quantifiable metrics (numbers, percentages, improvements).
6. Use job description keywords for ATS optimization.
7. No skill repeats more than 4 times across all projects.
8. Match the "project_points" count exactly to "Points Needed". If it is 0, return that project with an empty "project_points" array.
9. "project_skills" must align with the technologies mentioned in "project_points".
10. Return every project listed above exactly once, using its numeric ID as "project_id".
"#;

const PROJECT_OUTPUT_FORMAT: &str = r#"
EXAMPLE OUTPUT:
[{"project_id": 1, "project_name": "Customer Analytics Platform", "project_points": ["Built analytics system to help the business understand customer behavior patterns", "Developed real-time dashboard using Python and AWS Lambda processing 1M+ records daily, reducing analysis time by 40%"], "project_skills": ["Python", "AWS Lambda", "Data Analytics"]}]
"#;

const SKILL_RULES: &str = r#"
CORE REQUIREMENTS:
1. PRIMARY FOCUS: job description keywords and alignment with existing skills.
2. PRESERVE all existing skills that match the job requirements. Do NOT remove them.
3. ADD missing critical skills from the job description using exact keyword matching.
4. Use the experience and project content ONLY for validation: skills mentioned there must be included if they are job-relevant.
5. Use SPECIFIC tool names only. NO generic terms.
6. Each skill category, including its name and all its skills, should total 100-120 characters. Prioritize the most important skills when the limit is reached.

FORBIDDEN GENERIC TERMS (NEVER USE):
- "Microservices Architecture" -> use "Spring Boot", "Node.js", "Django"
- "Relational Databases" -> use "PostgreSQL", "MySQL", "SQL Server"
- "Infrastructure as Code" -> use "Terraform", "CloudFormation", "Ansible"
- "NoSQL Databases" -> use "MongoDB", "DynamoDB", "Cosmos DB"
- "Container Orchestration" -> use "Kubernetes", "Docker Swarm"
- "CI/CD" -> use "Jenkins", "GitLab CI", "GitHub Actions"

CLOUD PLATFORM DETECTION RULES:
- If the job description mentions AWS or AWS services, use AWS-specific tools.
- If the job description mentions Azure, use Azure-specific tools.
- If the job description mentions GCP or Google Cloud, use GCP-specific tools.
- If multiple clouds are mentioned, use the most frequently mentioned one.
- If no cloud is mentioned, use cloud tools from the existing skills.

SKILL VALIDATION:
- Skill in experience/projects AND job-relevant -> MUST include.
- Skill in current skills AND job-relevant -> MUST preserve.
- Add job description skills only when they complement existing expertise.
"#;

const SKILL_OUTPUT_FORMAT: &str = r#"
OUTPUT FORMAT (JSON only):
[
  {"skill_category": "Programming Languages", "skills": ["Java", "Python", "JavaScript", "SQL", "TypeScript"]},
  {"skill_category": "Web Frameworks", "skills": ["Spring Boot", "ReactJS", "Node.js", "Django"]}
]
"#;

// ────────────────────────────────────────────────────────────────────────────
// Builders
// ────────────────────────────────────────────────────────────────────────────

pub fn build_experience_prompt(
    job_role: &str,
    job_description: &str,
    entries: &[PromptEntry<'_, ExperienceRecord>],
    additional_instruction: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are an expert technical recruiter and ATS optimization specialist. Transform the \
         candidate's existing experience into high-impact, ATS-friendly resume bullet points that a \
         hiring manager for the target role would short-list.\n\n\
         Job Role (target position): {job_role}\n\
         Job Description (authoritative source of requirements): {job_description}\n\n\
         Candidate Work Experience (must be preserved and enhanced, not replaced):\n"
    );

    for entry in entries {
        let record = entry.record;
        prompt.push_str(&format!(
            "\nExperience ID: {}:\nCompany: {}\nRole: {}\n",
            entry.content_id,
            record.experience_name,
            record.role.as_deref().unwrap_or("Not specified"),
        ));
        if let Some(location) = record.location.as_deref().filter(|l| !l.is_empty()) {
            prompt.push_str(&format!("Location: {location}\n"));
        }
        prompt.push_str(&format!(
            "Description: {}\nBullet Points Needed: {}\n",
            record.experience_explanation, entry.bullets
        ));
    }

    finish(
        prompt,
        additional_instruction,
        EXPERIENCE_RULES,
        EXPERIENCE_OUTPUT_FORMAT,
    )
}

pub fn build_project_prompt(
    job_role: &str,
    job_description: &str,
    entries: &[PromptEntry<'_, ProjectRecord>],
    additional_instruction: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are an expert ATS optimization specialist. Transform existing projects into \
         ATS-friendly resume content for this role.\n\n\
         TARGET ROLE: {job_role}\n\
         JOB REQUIREMENTS: {job_description}\n\n\
         PROJECTS TO ENHANCE:\n"
    );

    for entry in entries {
        let record = entry.record;
        let skills = if record.skills.is_empty() {
            "None listed".to_string()
        } else {
            record.skills.join(", ")
        };
        prompt.push_str(&format!(
            "\nProject ID: {}\nName: {}\nDescription: {}\nCurrent Skills: {}\nPoints Needed: {}\n",
            entry.content_id, record.project_name, record.project_info, skills, entry.bullets
        ));
    }

    finish(
        prompt,
        additional_instruction,
        PROJECT_RULES,
        PROJECT_OUTPUT_FORMAT,
    )
}

pub fn build_skill_prompt(
    job_role: &str,
    job_description: &str,
    current_skills: &[SkillGroup],
    experiences: &[ExperienceHighlights],
    projects: &[ProjectHighlights],
    dominant_cloud: Option<CloudMention>,
    additional_instruction: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are an expert ATS optimization specialist. Create an optimized skills list using ONLY \
         specific, concrete tools and technologies.\n\n\
         TARGET JOB ROLE: {job_role}\n\n\
         JOB DESCRIPTION:\n{job_description}\n\n\
         CURRENT SKILLS TO OPTIMIZE:\n"
    );

    if current_skills.is_empty() {
        prompt.push_str("(none recorded)\n");
    }
    for group in current_skills {
        prompt.push_str(&format!(
            "Category: {}\nSkills: {}\n\n",
            group.category,
            group.skills.join(", ")
        ));
    }

    if !experiences.is_empty() {
        prompt.push_str("\nCANDIDATE'S WORK EXPERIENCE:\n");
        for exp in experiences {
            prompt.push_str(&format!("Role: {}\nKey Achievements:\n", exp.experience_role));
            for point in &exp.resume_points {
                prompt.push_str(&format!("  • {point}\n"));
            }
            prompt.push('\n');
        }
    }

    if !projects.is_empty() {
        prompt.push_str("\nCANDIDATE'S PROJECTS:\n");
        for proj in projects {
            prompt.push_str(&format!("Project: {}\nHighlights:\n", proj.project_name));
            for point in &proj.project_points {
                prompt.push_str(&format!("  • {point}\n"));
            }
            if !proj.project_skills.is_empty() {
                prompt.push_str(&format!(
                    "Technologies Used: {}\n",
                    proj.project_skills.join(", ")
                ));
            }
            prompt.push('\n');
        }
    }

    if let Some(mention) = dominant_cloud {
        prompt.push_str(&format!(
            "\nDETECTED CLOUD PLATFORM: {} (mentioned {} times in the job description)\n",
            mention.platform.label(),
            mention.count
        ));
    }

    finish(
        prompt,
        additional_instruction,
        SKILL_RULES,
        SKILL_OUTPUT_FORMAT,
    )
}

/// Appends the override block, rules, output schema and JSON-only instruction, in that order.
fn finish(
    mut prompt: String,
    additional_instruction: Option<&str>,
    rules: &str,
    output_format: &str,
) -> String {
    prompt.push_str(&priority_override_block(additional_instruction));
    prompt.push_str(rules);
    prompt.push_str(output_format);
    prompt.push('\n');
    prompt.push_str(JSON_ONLY_INSTRUCTION);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::content::fixtures::{experience, project};
    use crate::generation::skills::CloudPlatform;

    fn experience_entries(records: &[ExperienceRecord]) -> Vec<PromptEntry<'_, ExperienceRecord>> {
        records
            .iter()
            .map(|r| PromptEntry {
                content_id: ContentId::from_display_order(r.display_order).unwrap(),
                bullets: 3,
                record: r,
            })
            .collect()
    }

    #[test]
    fn test_experience_prompt_contains_role_and_each_id_once() {
        let records: Vec<_> = (0..12)
            .map(|i| experience(i, &format!("Company{i}"), "Engineer"))
            .collect();
        let entries = experience_entries(&records);
        let prompt = build_experience_prompt("Staff Platform Engineer", "Rust, AWS", &entries, None);

        assert!(prompt.contains("Staff Platform Engineer"));
        for entry in &entries {
            let marker = format!("Experience ID: {}:", entry.content_id);
            assert_eq!(prompt.matches(&marker).count(), 1, "{marker}");
        }
    }

    #[test]
    fn test_experience_prompt_embeds_fields_and_counts() {
        let records = vec![experience(0, "Acme", "Engineer")];
        let entries = vec![PromptEntry {
            content_id: ContentId(1),
            bullets: 2,
            record: &records[0],
        }];
        let prompt = build_experience_prompt("Engineer", "", &entries, None);

        assert!(prompt.contains("Company: Acme"));
        assert!(prompt.contains("Role: Engineer"));
        assert!(prompt.contains("Location: Remote"));
        assert!(prompt.contains("Description: Worked on platform services at Acme"));
        assert!(prompt.contains("Bullet Points Needed: 2"));
        assert!(prompt.contains("\"resume_points\""));
        assert!(prompt.ends_with(JSON_ONLY_INSTRUCTION));
    }

    #[test]
    fn test_zero_bullet_record_still_listed() {
        let records = vec![experience(0, "Acme", "Engineer")];
        let entries = vec![PromptEntry {
            content_id: ContentId(1),
            bullets: 0,
            record: &records[0],
        }];
        let prompt = build_experience_prompt("Engineer", "jd", &entries, None);
        assert!(prompt.contains("Experience ID: 1:"));
        assert!(prompt.contains("Bullet Points Needed: 0"));
    }

    #[test]
    fn test_override_sits_between_records_and_rules() {
        let records = vec![experience(0, "Acme", "Engineer")];
        let entries = experience_entries(&records);
        let prompt =
            build_experience_prompt("Engineer", "jd", &entries, Some("Write in first person"));

        let records_at = prompt.find("Experience ID: 1:").unwrap();
        let override_at = prompt.find("PRIORITY OVERRIDE").unwrap();
        let rules_at = prompt.find("Requirements for the bullet points").unwrap();
        assert!(records_at < override_at && override_at < rules_at);
        assert!(prompt.contains("Write in first person"));
    }

    #[test]
    fn test_no_override_block_without_instruction() {
        let records = vec![experience(0, "Acme", "Engineer")];
        let prompt = build_experience_prompt("Engineer", "jd", &experience_entries(&records), None);
        assert!(!prompt.contains("PRIORITY OVERRIDE"));
    }

    #[test]
    fn test_project_prompt_lists_skills_and_ids() {
        let records = vec![
            project(0, "Farm Insights", &["Python", "Pandas"]),
            project(1, "Bare", &[]),
        ];
        let entries: Vec<_> = records
            .iter()
            .map(|r| PromptEntry {
                content_id: ContentId::from_display_order(r.display_order).unwrap(),
                bullets: 2,
                record: r,
            })
            .collect();
        let prompt = build_project_prompt("Data Engineer", "Spark", &entries, None);

        assert!(prompt.contains("Data Engineer"));
        assert_eq!(prompt.matches("Project ID: 1\n").count(), 1);
        assert_eq!(prompt.matches("Project ID: 2\n").count(), 1);
        assert!(prompt.contains("Current Skills: Python, Pandas"));
        assert!(prompt.contains("Current Skills: None listed"));
        assert!(prompt.contains("Points Needed: 2"));
    }

    #[test]
    fn test_skill_prompt_includes_catalog_signal_and_cloud() {
        let groups = vec![SkillGroup {
            category: "Languages".to_string(),
            skills: vec!["Rust".to_string(), "Go".to_string()],
        }];
        let experiences = vec![ExperienceHighlights {
            experience_role: "Backend Engineer".to_string(),
            resume_points: vec!["Shipped Kafka consumers".to_string()],
        }];
        let projects = vec![ProjectHighlights {
            project_name: "Ledger".to_string(),
            project_points: vec!["Built ledger".to_string()],
            project_skills: vec!["PostgreSQL".to_string()],
        }];
        let cloud = Some(CloudMention {
            platform: CloudPlatform::Aws,
            count: 3,
        });
        let prompt = build_skill_prompt(
            "Backend Engineer",
            "AWS heavy role",
            &groups,
            &experiences,
            &projects,
            cloud,
            Some("Keep Go"),
        );

        assert!(prompt.contains("Category: Languages\nSkills: Rust, Go"));
        assert!(prompt.contains("  • Shipped Kafka consumers"));
        assert!(prompt.contains("Technologies Used: PostgreSQL"));
        assert!(prompt.contains("DETECTED CLOUD PLATFORM: AWS (mentioned 3 times"));
        assert!(prompt.find("Keep Go").unwrap() < prompt.find("CORE REQUIREMENTS").unwrap());
    }

    #[test]
    fn test_skill_prompt_without_catalog_says_so() {
        let prompt = build_skill_prompt("Dev", "", &[], &[], &[], None, None);
        assert!(prompt.contains("(none recorded)"));
        assert!(!prompt.contains("DETECTED CLOUD PLATFORM"));
        assert!(!prompt.contains("CANDIDATE'S PROJECTS"));
    }
}
