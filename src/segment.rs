//! Rule-based mapping from RFM score codes to named customer segments
//!
//! Rules are evaluated top to bottom and the first group containing the
//! code wins. Several codes appear in both the Potential Loyalist and the
//! Champions group; those always resolve to Potential Loyalist.

use std::fmt;

use crate::binning::RfmScores;

/// Customer segment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    LostCustomers,
    HibernatingCustomers,
    AtRisk,
    PotentialLoyalist,
    Promising,
    Champions,
    /// No rule group contains the code
    Unclassified,
}

impl Segment {
    pub fn label(&self) -> &'static str {
        match self {
            Segment::LostCustomers => "Lost customers",
            Segment::HibernatingCustomers => "Hibernating customers",
            Segment::AtRisk => "At Risk",
            Segment::PotentialLoyalist => "Potential Loyalist",
            Segment::Promising => "Promising",
            Segment::Champions => "Champions",
            Segment::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A segment and the exact score codes that belong to it
#[derive(Debug)]
pub struct SegmentRule {
    pub segment: Segment,
    pub codes: &'static [&'static str],
}

impl SegmentRule {
    pub fn matches(&self, code: &str) -> bool {
        self.codes.iter().any(|c| *c == code)
    }
}

/// Ordered rule table; earlier rules take precedence
pub static SEGMENT_RULES: [SegmentRule; 6] = [
    SegmentRule {
        segment: Segment::LostCustomers,
        codes: &["111", "112", "121", "131", "141", "151"],
    },
    SegmentRule {
        segment: Segment::HibernatingCustomers,
        codes: &[
            "332", "322", "233", "232", "223", "222", "132", "123", "122", "212", "211",
        ],
    },
    SegmentRule {
        segment: Segment::AtRisk,
        codes: &[
            "155", "154", "144", "214", "215", "115", "114", "113", "255", "254", "245", "244",
            "253", "252", "243", "242", "235", "234", "225", "224", "153", "152", "145", "143",
            "142", "135", "134", "133", "125", "124",
        ],
    },
    SegmentRule {
        segment: Segment::PotentialLoyalist,
        codes: &[
            "331", "321", "312", "221", "213", "231", "241", "251", "543", "444", "435", "355",
            "354", "345", "344", "335", "553", "551", "552", "541", "542", "533", "532", "531",
            "452", "451", "442", "441", "431", "453", "433", "432", "423", "353", "352", "351",
            "342", "341", "333", "323",
        ],
    },
    SegmentRule {
        segment: Segment::Promising,
        codes: &[
            "535", "534", "443", "434", "343", "334", "325", "324", "525", "524", "523", "522",
            "521", "515", "514", "513", "425", "424", "413", "414", "415", "315", "314", "313",
        ],
    },
    SegmentRule {
        segment: Segment::Champions,
        codes: &[
            "512", "511", "422", "421", "412", "411", "311", "543", "444", "435", "355", "354",
            "345", "344", "335", "553", "551", "552", "541", "542", "533", "532", "531", "452",
            "451", "442", "441", "431", "453", "433", "432", "423", "353", "352", "351", "342",
            "341", "333", "323", "555", "554", "544", "545", "454", "455", "445",
        ],
    },
];

/// Segment for a 3-digit score code; unknown codes are `Unclassified`
pub fn classify_code(code: &str) -> Segment {
    SEGMENT_RULES
        .iter()
        .find(|rule| rule.matches(code))
        .map(|rule| rule.segment)
        .unwrap_or(Segment::Unclassified)
}

pub fn classify(scores: &RfmScores) -> Segment {
    classify_code(&scores.code())
}
