use std::collections::{BTreeMap, HashMap};

use crate::extract::parse::normalize_course_code;
use crate::extract::{AttendanceRecord, Gradebook};

/// Attach attendance marks to gradebook courses by normalized course code.
///
/// Records sharing a normalized code are summed. Each course's marks are
/// replaced rather than added to, so merging twice gives the same result.
pub fn merge_attendance(gradebook: &mut Gradebook, records: &[AttendanceRecord]) {
    let mut by_code: HashMap<String, BTreeMap<String, u32>> = HashMap::new();
    for record in records {
        let marks = by_code
            .entry(normalize_course_code(&record.code))
            .or_default();
        for (label, count) in &record.marks {
            *marks.entry(label.clone()).or_default() += count;
        }
    }

    for course in &mut gradebook.courses {
        if let Some(marks) = by_code.get(&normalize_course_code(&course.code)) {
            course.attendance = marks.clone();
            course.attendance_total = marks.values().sum();
        }
    }
}
