/// Static accreditation standards
///
/// Two sets ship with A³E: the SACSCOC Principles of Accreditation (one entry
/// per section) and the HLC Criteria for Accreditation. Keywords are single
/// lowercase words; [`super::mapping`] matches them against document tokens.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardSet {
    #[default]
    Sacscoc,
    Hlc,
}

impl StandardSet {
    pub const ALL: [StandardSet; 2] = [StandardSet::Sacscoc, StandardSet::Hlc];

    pub fn as_str(&self) -> &'static str {
        match self {
            StandardSet::Sacscoc => "sacscoc",
            StandardSet::Hlc => "hlc",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sacscoc" => Some(StandardSet::Sacscoc),
            "hlc" => Some(StandardSet::Hlc),
            _ => None,
        }
    }

    pub fn accreditor(&self) -> &'static str {
        match self {
            StandardSet::Sacscoc => "Southern Association of Colleges and Schools Commission on Colleges",
            StandardSet::Hlc => "Higher Learning Commission",
        }
    }

    pub fn standards(&self) -> &'static [Standard] {
        match self {
            StandardSet::Sacscoc => SACSCOC,
            StandardSet::Hlc => HLC,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standard {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
}

/// Looks a standard up by id across every set
pub fn find_standard(id: &str) -> Option<(StandardSet, &'static Standard)> {
    StandardSet::ALL.into_iter().find_map(|set| {
        set.standards()
            .iter()
            .find(|s| s.id.eq_ignore_ascii_case(id))
            .map(|s| (set, s))
    })
}

static SACSCOC: &[Standard] = &[
    Standard {
        id: "SACSCOC-1",
        title: "The Principle of Integrity",
        description: "The institution operates with integrity in all matters and in its relationship with the Commission.",
        keywords: &["integrity", "honesty", "ethics", "transparency", "disclosure", "compliance"],
    },
    Standard {
        id: "SACSCOC-2",
        title: "Mission",
        description: "The institution has a clearly defined, comprehensive and published mission specific to the institution.",
        keywords: &["mission", "vision", "purpose", "values", "published", "approved"],
    },
    Standard {
        id: "SACSCOC-4",
        title: "Governing Board",
        description: "The institution has a functioning governing board with appropriate independence and oversight.",
        keywords: &["board", "trustees", "governance", "bylaws", "oversight", "conflict", "fiduciary"],
    },
    Standard {
        id: "SACSCOC-5",
        title: "Administration and Organization",
        description: "The institution has a chief executive officer and an organizational structure that supports its mission.",
        keywords: &["president", "administration", "organizational", "chart", "executive", "evaluation"],
    },
    Standard {
        id: "SACSCOC-6",
        title: "Faculty",
        description: "The institution employs an adequate number of qualified full-time faculty and evaluates them regularly.",
        keywords: &["faculty", "credentials", "qualifications", "workload", "tenure", "development"],
    },
    Standard {
        id: "SACSCOC-7",
        title: "Institutional Planning and Effectiveness",
        description: "The institution engages in ongoing, research-based planning and evaluation, including a Quality Enhancement Plan.",
        keywords: &["planning", "effectiveness", "assessment", "outcomes", "improvement", "qep", "strategic"],
    },
    Standard {
        id: "SACSCOC-8",
        title: "Student Achievement",
        description: "The institution identifies and evaluates student achievement and student learning outcomes.",
        keywords: &["achievement", "retention", "graduation", "completion", "learning", "outcomes", "assessment"],
    },
    Standard {
        id: "SACSCOC-9",
        title: "Educational Program Structure and Content",
        description: "Educational programs are consistent with the mission and embody a coherent course of study.",
        keywords: &["curriculum", "program", "degree", "credit", "hours", "coherent", "general", "education"],
    },
    Standard {
        id: "SACSCOC-10",
        title: "Educational Policies, Procedures, and Practices",
        description: "Academic policies are published, implemented and enforced, including transfer and admission policies.",
        keywords: &["policies", "admission", "transfer", "catalog", "grading", "advising", "transcript"],
    },
    Standard {
        id: "SACSCOC-11",
        title: "Library and Learning/Information Resources",
        description: "The institution provides adequate library and learning resources and instruction in their use.",
        keywords: &["library", "collections", "databases", "information", "literacy", "resources"],
    },
    Standard {
        id: "SACSCOC-12",
        title: "Academic and Student Support Services",
        description: "The institution provides student support programs, services and activities consistent with its mission.",
        keywords: &["support", "services", "counseling", "tutoring", "disability", "complaints", "records"],
    },
    Standard {
        id: "SACSCOC-13",
        title: "Financial and Physical Resources",
        description: "The institution has a sound financial base, audited statements and adequate physical resources.",
        keywords: &["financial", "budget", "audit", "revenue", "facilities", "safety", "stability"],
    },
    Standard {
        id: "SACSCOC-14",
        title: "Transparency and Institutional Representation",
        description: "The institution accurately represents its accreditation status and reports substantive change.",
        keywords: &["accreditation", "substantive", "change", "representation", "status", "reporting"],
    },
];

static HLC: &[Standard] = &[
    Standard {
        id: "HLC-1",
        title: "Mission",
        description: "The institution's mission is clear and articulated publicly; it guides the institution's operations.",
        keywords: &["mission", "public", "diversity", "engagement", "community", "articulated"],
    },
    Standard {
        id: "HLC-2",
        title: "Integrity: Ethical and Responsible Conduct",
        description: "The institution acts with integrity; its conduct is ethical and responsible.",
        keywords: &["integrity", "ethical", "governance", "board", "freedom", "research", "transparency"],
    },
    Standard {
        id: "HLC-3",
        title: "Teaching and Learning: Quality, Resources, and Support",
        description: "The institution provides quality education, wherever and however its offerings are delivered.",
        keywords: &["curriculum", "faculty", "instruction", "degree", "support", "resources", "rigor"],
    },
    Standard {
        id: "HLC-4",
        title: "Teaching and Learning: Evaluation and Improvement",
        description: "The institution demonstrates responsibility for the quality of its educational programs and works to improve student learning.",
        keywords: &["assessment", "evaluation", "improvement", "retention", "persistence", "completion", "outcomes"],
    },
    Standard {
        id: "HLC-5",
        title: "Institutional Effectiveness, Resources and Planning",
        description: "The institution's resources, structures, processes and planning are sufficient to fulfill its mission.",
        keywords: &["planning", "budget", "financial", "resources", "effectiveness", "strategic", "allocation"],
    },
];
