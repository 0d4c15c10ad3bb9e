//! Persuasion categories
//!
//! Cialdini's six principles of influence, as used to tag phishing
//! stimuli. Category names are the canonical tag values; descriptions go
//! into the classifier prompt.

/// One persuasion principle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersuasionCategory {
    pub name: &'static str,
    pub description: &'static str,
}

pub const PERSUASION_CATEGORIES: [PersuasionCategory; 6] = [
    PersuasionCategory {
        name: "reciprocation",
        description: "People feel obligated to return favors. Phishing attackers exploit this by \
            offering fake gifts or benefits to create a sense of indebtedness, making victims more \
            likely to comply with malicious requests in 'return.'",
    },
    PersuasionCategory {
        name: "consistency",
        description: "People desire to be consistent with their prior commitments and actions. \
            Phishing attackers leverage this by referencing fake past agreements or sign-ups to \
            pressure victims into acting in a way that aligns with this fabricated consistency, \
            like confirming details or completing transactions.",
    },
    PersuasionCategory {
        name: "social_proof",
        description: "People look to others to determine appropriate behavior, especially in \
            uncertain situations. Phishing attackers use fake indicators of popularity or \
            consensus (like fake reviews, likes, or claims of widespread action) to make their \
            scams appear legitimate and encourage victims to follow 'the crowd.'",
    },
    PersuasionCategory {
        name: "liking",
        description: "People are more likely to comply with requests from individuals they like \
            or know. Phishing attackers exploit this by impersonating trusted individuals \
            (friends, colleagues, brands) or building fake rapport to lower defenses and increase \
            compliance, appealing to common interests or hobbies.",
    },
    PersuasionCategory {
        name: "authority",
        description: "People tend to obey figures perceived as authoritative. Phishing attackers \
            impersonate authority figures or institutions (like banks or government agencies) to \
            pressure victims into compliance by creating a false sense of legitimacy and \
            obligation.",
    },
    PersuasionCategory {
        name: "scarcity",
        description: "People value things that are rare or limited. Phishing attackers use \
            urgency and limited availability (like time-sensitive offers or account suspension \
            threats) to create fear of missing out (FOMO) and pressure victims into acting \
            impulsively without thinking critically.",
    },
];

/// Fold case and word separators so "Social Proof" and "social-proof" compare equal
fn fold(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Canonical category name for a label, if it names a known category
pub fn canonical(label: &str) -> Option<&'static str> {
    let folded = fold(label);
    PERSUASION_CATEGORIES
        .iter()
        .find(|c| c.name == folded)
        .map(|c| c.name)
}

/// Categories mentioned anywhere in free text, in category order
pub fn mentioned_in(text: &str) -> Vec<&'static str> {
    let folded = fold(text);
    PERSUASION_CATEGORIES
        .iter()
        .filter(|c| folded.contains(c.name))
        .map(|c| c.name)
        .collect()
}

/// Prompt fragment listing every category with its description
pub fn prompt_listing() -> String {
    PERSUASION_CATEGORIES
        .iter()
        .map(|c| format!("{} ({})", c.name, c.description))
        .collect::<Vec<_>>()
        .join(", ")
}
