//! Result statistics
//!
//! `average` summarizes the grade column of a result CSV. `compare` checks
//! model grades against human review sheets:
//!
//! ```text
//! review.csv row:  <result index>, _, _, yes, <max points>, <points>
//!                        │
//!                        ▼
//! result.csv row (header skipped) ──► model grade column
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Grades this close to 1.0 count as perfect
const PERFECT_EPSILON: f64 = 0.001;

/// Human and model grades this close count as a match
const MATCH_EPSILON: f64 = 0.01;

const REVIEW_INDEX_COLUMN: usize = 0;
const REVIEW_INCLUDE_COLUMN: usize = 3;
const REVIEW_MAX_COLUMN: usize = 4;
const REVIEW_POINTS_COLUMN: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("Failed to read {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("No comparable rows found")]
    NoData,
}

/// Parse `"X/Y"` into `X / Y`; a bare number is taken as-is
pub fn parse_fraction(text: &str) -> Option<f64> {
    let text = text.trim();
    let Some((num, den)) = text.split_once('/') else {
        return text.parse::<f64>().ok().filter(|v| v.is_finite());
    };
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

fn is_perfect(value: f64) -> bool {
    (value - 1.0).abs() < PERFECT_EPSILON
}

fn read_rows(path: &Path) -> Result<Vec<csv::StringRecord>, StatsError> {
    let wrap = |source| StatsError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(wrap)?;
    reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(wrap)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AverageReport {
    pub count: usize,
    pub mean: Option<f64>,
    pub perfect: usize,
}

impl fmt::Display for AverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mean {
            Some(mean) => writeln!(f, "Average grade: {:.4}", mean)?,
            None => writeln!(f, "Average grade: n/a")?,
        }
        writeln!(f, "Graded rows: {}", self.count)?;
        write!(f, "Perfect grades: {}", self.perfect)
    }
}

/// Average of column 0; rows that do not parse as `X/Y` are skipped
pub fn average(path: &Path) -> Result<AverageReport, StatsError> {
    let values: Vec<f64> = read_rows(path)?
        .iter()
        .filter_map(|row| row.get(0).and_then(parse_fraction))
        .collect();
    Ok(summarize(&values))
}

fn summarize(values: &[f64]) -> AverageReport {
    let count = values.len();
    AverageReport {
        count,
        mean: (count > 0).then(|| values.iter().sum::<f64>() / count as f64),
        perfect: values.iter().filter(|v| is_perfect(**v)).count(),
    }
}

/// Model grade compared against the range of human grades for one result row
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap {
    pub result_csv: PathBuf,
    pub row: usize,
    pub human_min: f64,
    pub human_max: f64,
    pub model: f64,
}

impl Overlap {
    pub fn within_range(&self) -> bool {
        self.model >= self.human_min && self.model <= self.human_max
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompareReport {
    pub compared: usize,
    pub mean_absolute_difference: f64,
    /// Human minus model, averaged
    pub mean_relative_difference: f64,
    pub percent_over_estimated: f64,
    pub percent_under_estimated: f64,
    pub percent_exact_match: f64,
    /// Both perfect, over rows where either side is perfect
    pub percent_perfect_agreement: f64,
    pub user_perfect_not_model: usize,
    pub model_perfect_not_user: usize,
    /// `None` when either side has no variance
    pub spearman: Option<f64>,
    /// Result rows graded by more than one reviewer
    pub overlaps: Vec<Overlap>,
}

impl fmt::Display for CompareReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total compared: {}", self.compared)?;
        writeln!(f, "User perfect, model not: {}", self.user_perfect_not_model)?;
        writeln!(f, "Model perfect, user not: {}", self.model_perfect_not_user)?;
        writeln!(f, "Average absolute difference: {:.4}", self.mean_absolute_difference)?;
        writeln!(f, "Average relative difference: {:.4}", self.mean_relative_difference)?;
        writeln!(f, "Percent model overestimated: {:.2}", self.percent_over_estimated)?;
        writeln!(f, "Percent model underestimated: {:.2}", self.percent_under_estimated)?;
        writeln!(f, "Percent exact match within epsilon: {:.2}", self.percent_exact_match)?;
        writeln!(
            f,
            "Percent perfect agreement (adjusted): {:.2}",
            self.percent_perfect_agreement
        )?;
        match self.spearman {
            Some(rho) => writeln!(f, "Spearman correlation: {:.4}", rho)?,
            None => writeln!(f, "Spearman correlation: undefined")?,
        }
        write!(f, "Overlap analysis:")?;
        for o in &self.overlaps {
            write!(
                f,
                "\n  {} row {}: model grade {} the range",
                o.result_csv.display(),
                o.row,
                if o.within_range() { "within" } else { "outside" }
            )?;
        }
        Ok(())
    }
}

/// Compare model grades with human reviews
///
/// # Arguments
/// * `pairs` - `(review_csv, result_csv)` pairs
/// * `model_grade_column` - Column of the result CSV holding the model grade
pub fn compare(
    pairs: &[(PathBuf, PathBuf)],
    model_grade_column: usize,
) -> Result<CompareReport, StatsError> {
    let mut human = Vec::new();
    let mut model = Vec::new();
    let mut by_row: BTreeMap<(PathBuf, usize), Vec<(f64, f64)>> = BTreeMap::new();

    for (review_csv, result_csv) in pairs {
        let reviews = read_rows(review_csv)?;
        let results = read_rows(result_csv)?;
        let results = results.get(1..).unwrap_or_default();

        for review in reviews.iter().skip(1) {
            let included = review
                .get(REVIEW_INCLUDE_COLUMN)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("yes"));
            if !included {
                continue;
            }

            let Some(index) = review
                .get(REVIEW_INDEX_COLUMN)
                .and_then(|v| v.trim().parse::<usize>().ok())
            else {
                warn!(review = %review_csv.display(), "Review row without a result index");
                continue;
            };
            let human_grade = match (review.get(REVIEW_POINTS_COLUMN), review.get(REVIEW_MAX_COLUMN)) {
                (Some(points), Some(max)) => parse_fraction(&format!("{}/{}", points, max)),
                _ => None,
            };
            let Some(human_grade) = human_grade else {
                warn!(review = %review_csv.display(), index, "Review row without a usable grade");
                continue;
            };
            let Some(model_grade) = results
                .get(index)
                .and_then(|row| row.get(model_grade_column))
                .and_then(parse_fraction)
            else {
                debug!(result = %result_csv.display(), index, "No model grade for reviewed row");
                continue;
            };

            human.push(human_grade);
            model.push(model_grade);
            by_row
                .entry((result_csv.clone(), index))
                .or_default()
                .push((human_grade, model_grade));
        }
    }

    if human.is_empty() {
        return Err(StatsError::NoData);
    }

    let mut report = aggregate(&human, &model);
    report.overlaps = by_row
        .into_iter()
        .filter(|(_, grades)| grades.len() > 1)
        .map(|((result_csv, row), grades)| {
            let humans = grades.iter().map(|(h, _)| *h);
            Overlap {
                result_csv,
                row,
                human_min: humans.clone().fold(f64::INFINITY, f64::min),
                human_max: humans.fold(f64::NEG_INFINITY, f64::max),
                model: grades[0].1,
            }
        })
        .collect();
    Ok(report)
}

fn aggregate(human: &[f64], model: &[f64]) -> CompareReport {
    let n = human.len() as f64;
    let percent = |count: usize| count as f64 / n * 100.0;

    let mut abs_total = 0.0;
    let mut rel_total = 0.0;
    let (mut over, mut under, mut exact) = (0, 0, 0);
    let (mut either_perfect, mut both_perfect) = (0, 0);
    let (mut user_only, mut model_only) = (0, 0);

    for (&h, &m) in human.iter().zip(model) {
        let diff = (h - m).abs();
        abs_total += diff;
        rel_total += h - m;
        if diff <= MATCH_EPSILON {
            exact += 1;
        }
        if h < m {
            over += 1;
        } else if h > m {
            under += 1;
        }
        match (is_perfect(h), is_perfect(m)) {
            (true, true) => {
                either_perfect += 1;
                both_perfect += 1;
            }
            (true, false) => {
                either_perfect += 1;
                user_only += 1;
            }
            (false, true) => {
                either_perfect += 1;
                model_only += 1;
            }
            (false, false) => {}
        }
    }

    CompareReport {
        compared: human.len(),
        mean_absolute_difference: abs_total / n,
        mean_relative_difference: rel_total / n,
        percent_over_estimated: percent(over),
        percent_under_estimated: percent(under),
        percent_exact_match: percent(exact),
        percent_perfect_agreement: if either_perfect > 0 {
            both_perfect as f64 / either_perfect as f64 * 100.0
        } else {
            0.0
        },
        user_perfect_not_model: user_only,
        model_perfect_not_user: model_only,
        spearman: spearman(human, model),
        overlaps: Vec::new(),
    }
}

/// Ranks starting at 1; ties share their average rank
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        cov += (a - mean_x) * (b - mean_y);
        var_x += (a - mean_x).powi(2);
        var_y += (b - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Spearman rank correlation
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    pearson(&average_ranks(x), &average_ranks(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_fraction("3/4"), Some(0.75));
        assert_eq!(parse_fraction(" 1 / 2 "), Some(0.5));
        assert_eq!(parse_fraction("1/0"), None);
        assert_eq!(parse_fraction("Grade"), None);
        assert_eq!(parse_fraction(""), None);
        assert_eq!(parse_fraction("1"), Some(1.0));
        assert_eq!(parse_fraction(" 0.75 "), Some(0.75));
        assert_eq!(parse_fraction("NaN"), None);
        assert_eq!(parse_fraction("inf"), None);
    }

    #[test]
    fn test_average_accepts_bare_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "r.csv", "Grade,Puzzle
1,a
0.5,b
1/2,c
bad,d
");
        let report = average(&path).unwrap();
        assert_eq!(report.count, 3);
        assert!((report.mean.unwrap() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.perfect, 1);
    }

    #[test]
    fn test_average_skips_unparsable() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "r.csv", "Grade,Puzzle\n1/2,a\n1/1,b\nbad,c\n,d\n");
        let report = average(&path).unwrap();
        assert_eq!(report.count, 2);
        assert!((report.mean.unwrap() - 0.75).abs() < 1e-9);
        assert_eq!(report.perfect, 1);
    }

    #[test]
    fn test_average_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "r.csv", "Grade,Puzzle\n");
        let report = average(&path).unwrap();
        assert_eq!(report.count, 0);
        assert!(report.mean.is_none());
    }

    #[test]
    fn test_average_ranks_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn test_spearman() {
        let x = [0.1, 0.5, 0.7, 1.0];
        assert!((spearman(&x, &x).unwrap() - 1.0).abs() < 1e-9);
        let reversed = [1.0, 0.7, 0.5, 0.1];
        assert!((spearman(&x, &reversed).unwrap() + 1.0).abs() < 1e-9);
        assert!(spearman(&x, &[0.5; 4]).is_none());
    }

    #[test]
    fn test_compare() {
        let dir = tempfile::tempdir().unwrap();
        let results = write(
            dir.path(),
            "results.csv",
            "Grade,Puzzle\n4/4,p0\n2/4,p1\n3/4,p2\n",
        );
        let review_a = write(
            dir.path(),
            "review_a.csv",
            "Index,Reviewer,Notes,Include,Max,Points\n\
             0,a,,yes,4,4\n\
             1,a,,YES,4,3\n\
             2,a,,no,4,0\n",
        );
        let review_b = write(
            dir.path(),
            "review_b.csv",
            "Index,Reviewer,Notes,Include,Max,Points\n\
             1,b,,yes,4,1\n\
             2,b,,yes,4,4\n\
             9,b,,yes,4,4\n",
        );

        let report = compare(
            &[(review_a, results.clone()), (review_b, results.clone())],
            0,
        )
        .unwrap();

        // (1.0,1.0) (0.75,0.5) (0.25,0.5) (1.0,0.75)
        assert_eq!(report.compared, 4);
        assert!((report.mean_absolute_difference - 0.1875).abs() < 1e-9);
        assert!((report.mean_relative_difference - 0.0625).abs() < 1e-9);
        assert_eq!(report.percent_over_estimated, 25.0);
        assert_eq!(report.percent_under_estimated, 50.0);
        assert_eq!(report.percent_exact_match, 25.0);
        assert_eq!(report.user_perfect_not_model, 1);
        assert_eq!(report.model_perfect_not_user, 0);
        assert!((report.percent_perfect_agreement - 50.0).abs() < 1e-9);
        assert!(report.spearman.is_some());

        assert_eq!(report.overlaps.len(), 1);
        let overlap = &report.overlaps[0];
        assert_eq!(overlap.row, 1);
        assert_eq!(overlap.result_csv, results);
        assert!(overlap.within_range());
    }

    #[test]
    fn test_compare_without_rows() {
        let dir = tempfile::tempdir().unwrap();
        let results = write(dir.path(), "results.csv", "Grade\n1/1\n");
        let review = write(dir.path(), "review.csv", "a,b,c,d,e,f\n0,,,no,1,1\n");
        assert!(matches!(compare(&[(review, results)], 0), Err(StatsError::NoData)));
    }
}
