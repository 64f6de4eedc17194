use serde::{Serialize, Serializer};

/// Point grade on the national 1..=9 scale. 1 is the best, 9 is a fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Grade(u8);

/// Lower bound (percent) for grades 1..=8, best first. Anything below the last
/// cut point is grade 9.
const CUT_POINTS: [f64; 8] = [75.0, 65.0, 55.0, 45.0, 40.0, 35.0, 30.0, 25.0];

impl Grade {
    pub const FAIL: Grade = Grade(9);

    pub fn label(self) -> String {
        self.0.to_string()
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Distinction,
    Merit,
    Credit,
    Pass,
    Fail,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Distinction => "Distinction",
            Tier::Merit => "Merit",
            Tier::Credit => "Credit",
            Tier::Pass => "Pass",
            Tier::Fail => "Fail",
        }
    }
}

/// Map a raw mark to a grade. Out-of-range input lands in the top or bottom
/// bucket; NaN is a fail.
pub fn grade_of(raw_mark: f64, max_mark: f64) -> Grade {
    let percentage = raw_mark / max_mark * 100.0;
    for (i, cut) in CUT_POINTS.iter().enumerate() {
        if percentage >= *cut {
            return Grade(i as u8 + 1);
        }
    }
    Grade::FAIL
}

/// Integer value of a grade label. Anything unparseable counts as a fail (9).
pub fn points_of(label: &str) -> u8 {
    let t = label.trim();
    let digits: String = t.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u8>().unwrap_or(9)
}

pub fn remark_of(label: &str) -> &'static str {
    match label {
        "1" => Tier::Distinction.as_str(),
        "2" => Tier::Merit.as_str(),
        "3" | "4" | "5" => Tier::Credit.as_str(),
        "6" | "7" | "8" => Tier::Pass.as_str(),
        "9" => Tier::Fail.as_str(),
        _ => "",
    }
}
