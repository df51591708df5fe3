use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::dataset::{MatchDataset, MatchResult};
use crate::error::MetricsError;
use crate::rates::{DEFAULT_EXPONENT, pythagorean_of, validate_exponent, win_rate_of};
use crate::standings::{TeamTally, tally_by_team};

pub const FEATURE_COUNT: usize = 5;
const CLASS_COUNT: usize = 3;
const HOLDOUT_RATIO: f64 = 0.30;
const SMOTE_NEIGHBORS: usize = 5;

/// How per-match strength features are computed during `fit`.
///
/// `InSample` keeps the upstream behavior: each team's rates come from the
/// whole supplied season, so a match's own outcome leaks into its own
/// features. `LeaveOneOut` removes the match being labelled before rating
/// either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureMode {
    InSample,
    LeaveOneOut,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub exponent: f64,
    pub feature_mode: FeatureMode,
    /// L2 penalty weight (inverse of the usual `C`).
    pub l2: f64,
    pub learning_rate: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            exponent: DEFAULT_EXPONENT,
            feature_mode: FeatureMode::InSample,
            l2: 1.0,
            learning_rate: 0.5,
            max_iterations: 5_000,
            tolerance: 1e-6,
            seed: 42,
        }
    }
}

/// One match's resolved feature row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchFeatures {
    pub home_win_rate: f64,
    pub away_win_rate: f64,
    pub home_pythagorean: f64,
    pub away_pythagorean: f64,
    pub pythagorean_difference: f64,
}

impl MatchFeatures {
    fn from_tallies(home: &TeamTally, away: &TeamTally, exponent: f64) -> Self {
        let home_pythagorean = pythagorean_of(home, exponent);
        let away_pythagorean = pythagorean_of(away, exponent);
        Self {
            home_win_rate: win_rate_of(home),
            away_win_rate: win_rate_of(away),
            home_pythagorean,
            away_pythagorean,
            pythagorean_difference: home_pythagorean - away_pythagorean,
        }
    }

    fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.home_win_rate,
            self.away_win_rate,
            self.home_pythagorean,
            self.away_pythagorean,
            self.pythagorean_difference,
        ]
    }

    fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            home_win_rate: values[0],
            away_win_rate: values[1],
            home_pythagorean: values[2],
            away_pythagorean: values[3],
            pythagorean_difference: values[4],
        }
    }
}

/// Per-feature centering/scaling fitted on the training feature matrix and
/// re-applied verbatim at prediction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standardizer {
    means: [f64; FEATURE_COUNT],
    stds: [f64; FEATURE_COUNT],
}

impl Standardizer {
    fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut means = [0.0; FEATURE_COUNT];
        let mut stds = [1.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            let mean = rows.iter().map(|r| r[j]).sum::<f64>() / n;
            let var = rows.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
            means[j] = mean;
            // A constant column carries no signal; leave it centered only.
            stds[j] = if var.sqrt() > 1e-12 { var.sqrt() } else { 1.0 };
        }
        Self { means, stds }
    }

    fn transform(&self, row: [f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            out[j] = (row[j] - self.means[j]) / self.stds[j];
        }
        out
    }

    fn inverse(&self, row: [f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            out[j] = row[j] * self.stds[j] + self.means[j];
        }
        out
    }
}

/// Immutable fit artifact: standardization parameters plus softmax weights.
/// Threaded explicitly from `fit` to `predict`, never stored as ambient
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    standardizer: Standardizer,
    weights: Array2<f64>,
    intercepts: Array1<f64>,
    exponent: f64,
}

/// Three-way outcome probabilities, home/draw/away.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutcomeProbs {
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
}

impl OutcomeProbs {
    pub fn sum(&self) -> f64 {
        self.home_win + self.draw + self.away_win
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub predicted: MatchResult,
    pub probabilities: OutcomeProbs,
}

/// A held-out row with its label and the model's call, features reported in
/// rate space (standardization undone).
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRow {
    pub features: MatchFeatures,
    pub actual: MatchResult,
    pub predicted: MatchResult,
}

#[derive(Debug, Clone)]
pub struct FitReport {
    pub model: TrainedModel,
    pub accuracy: f64,
    /// Rows = actual, columns = predicted, both ordered
    /// [HomeWin, Draw, AwayWin].
    pub confusion: [[usize; CLASS_COUNT]; CLASS_COUNT],
    pub scored: Vec<ScoredRow>,
}

/// Ordinal class encoding: home advantage makes HomeWin the high class.
fn class_index(result: MatchResult) -> usize {
    match result {
        MatchResult::AwayWin => 0,
        MatchResult::Draw => 1,
        MatchResult::HomeWin => 2,
    }
}

fn class_of_index(index: usize) -> MatchResult {
    match index {
        0 => MatchResult::AwayWin,
        1 => MatchResult::Draw,
        _ => MatchResult::HomeWin,
    }
}

/// Confusion axes run [HomeWin, Draw, AwayWin], the reverse of the ordinal
/// encoding.
fn display_index(class: usize) -> usize {
    CLASS_COUNT - 1 - class
}

/// Trains the three-way outcome model: feature rows over the supplied
/// season, standardization, synthetic minority oversampling, a seeded 70/30
/// split, then softmax regression to convergence.
pub fn fit(dataset: &MatchDataset, config: &ClassifierConfig) -> Result<FitReport, MetricsError> {
    validate_config(config)?;

    let rows = feature_rows(dataset, config);
    let mut class_counts = [0usize; CLASS_COUNT];
    for (_, label) in &rows {
        class_counts[*label] += 1;
    }
    if class_counts.iter().any(|&c| c == 0) {
        return Err(MetricsError::invalid_parameter(
            "matches",
            format!(
                "every outcome class needs at least one example (home/draw/away = {}/{}/{})",
                class_counts[2], class_counts[1], class_counts[0]
            ),
        ));
    }

    let features: Vec<[f64; FEATURE_COUNT]> = rows.iter().map(|(f, _)| f.as_array()).collect();
    let labels: Vec<usize> = rows.iter().map(|(_, label)| *label).collect();

    let standardizer = Standardizer::fit(&features);
    let standardized: Vec<[f64; FEATURE_COUNT]> = features
        .into_iter()
        .map(|row| standardizer.transform(row))
        .collect();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let (balanced, balanced_labels) = oversample(standardized, labels, &mut rng);

    let mut order: Vec<usize> = (0..balanced.len()).collect();
    order.shuffle(&mut rng);
    let holdout_len = ((balanced.len() as f64) * HOLDOUT_RATIO).floor() as usize;
    let holdout_len = holdout_len.max(1);
    if holdout_len >= balanced.len() {
        return Err(MetricsError::invalid_parameter(
            "matches",
            format!("{} rows are too few to split for training", balanced.len()),
        ));
    }
    let (train_idx, holdout_idx) = order.split_at(balanced.len() - holdout_len);

    let x_train = to_matrix(&balanced, train_idx);
    let y_train: Vec<usize> = train_idx.iter().map(|&i| balanced_labels[i]).collect();
    let (weights, intercepts) = train_softmax(&x_train, &y_train, config);

    let model = TrainedModel {
        standardizer,
        weights,
        intercepts,
        exponent: config.exponent,
    };

    let mut confusion = [[0usize; CLASS_COUNT]; CLASS_COUNT];
    let mut correct = 0usize;
    let mut scored = Vec::with_capacity(holdout_idx.len());
    for &i in holdout_idx {
        let probs = model.class_probabilities(balanced[i]);
        let predicted = argmax3(&probs);
        let actual = balanced_labels[i];
        confusion[display_index(actual)][display_index(predicted)] += 1;
        if predicted == actual {
            correct += 1;
        }
        scored.push(ScoredRow {
            features: MatchFeatures::from_array(model.standardizer.inverse(balanced[i])),
            actual: class_of_index(actual),
            predicted: class_of_index(predicted),
        });
    }
    let accuracy = correct as f64 / holdout_idx.len() as f64;
    log::debug!(
        "fit: {} train / {} held-out rows, holdout accuracy {accuracy:.3}",
        train_idx.len(),
        holdout_idx.len(),
    );

    Ok(FitReport {
        model,
        accuracy,
        confusion,
        scored,
    })
}

/// Scores one pairing with an already-fitted model. Rates are resolved from
/// the supplied dataset, features built and standardized exactly as at fit
/// time. Probabilities are rounded to 3 decimals with the rounding residue
/// folded into the largest class so the three always sum to 1.0.
pub fn predict(
    dataset: &MatchDataset,
    home_team: &str,
    away_team: &str,
    model: &TrainedModel,
) -> Result<Prediction, MetricsError> {
    let tallies = tally_by_team(dataset.matches());
    let home = tallies
        .get(home_team)
        .copied()
        .ok_or_else(|| MetricsError::unknown_team(home_team))?;
    let away = tallies
        .get(away_team)
        .copied()
        .ok_or_else(|| MetricsError::unknown_team(away_team))?;

    let features = MatchFeatures::from_tallies(&home, &away, model.exponent);
    let standardized = model.standardizer.transform(features.as_array());
    let probs = model.class_probabilities(standardized);
    let rounded = round_probs(&probs);
    let predicted = class_of_index(argmax3(&rounded));

    Ok(Prediction {
        predicted,
        probabilities: OutcomeProbs {
            home_win: rounded[2],
            draw: rounded[1],
            away_win: rounded[0],
        },
    })
}

impl TrainedModel {
    fn class_probabilities(&self, features: [f64; FEATURE_COUNT]) -> [f64; CLASS_COUNT] {
        let mut logits = [0.0; CLASS_COUNT];
        for c in 0..CLASS_COUNT {
            let mut z = self.intercepts[c];
            for j in 0..FEATURE_COUNT {
                z += self.weights[[c, j]] * features[j];
            }
            logits[c] = z;
        }
        softmax(logits)
    }
}

fn validate_config(config: &ClassifierConfig) -> Result<(), MetricsError> {
    validate_exponent(config.exponent)?;
    if !config.l2.is_finite() || config.l2 < 0.0 {
        return Err(MetricsError::invalid_parameter(
            "l2",
            format!("must be a non-negative finite number, got {}", config.l2),
        ));
    }
    if !config.learning_rate.is_finite() || config.learning_rate <= 0.0 {
        return Err(MetricsError::invalid_parameter(
            "learning_rate",
            format!("must be positive, got {}", config.learning_rate),
        ));
    }
    if config.max_iterations == 0 {
        return Err(MetricsError::invalid_parameter(
            "max_iterations",
            "must be at least 1".to_string(),
        ));
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(MetricsError::invalid_parameter(
            "tolerance",
            format!("must be positive, got {}", config.tolerance),
        ));
    }
    Ok(())
}

/// One labelled feature row per match. In leave-one-out mode a side whose
/// only appearance is the match itself has no resolvable profile, so that
/// row is dropped rather than filled with zeros.
fn feature_rows(dataset: &MatchDataset, config: &ClassifierConfig) -> Vec<(MatchFeatures, usize)> {
    let tallies = tally_by_team(dataset.matches());
    let mut rows = Vec::with_capacity(dataset.len());
    for m in dataset.matches() {
        let Some(home) = tallies.get(m.home_team.as_str()).copied() else {
            continue;
        };
        let Some(away) = tallies.get(m.away_team.as_str()).copied() else {
            continue;
        };
        let (home, away) = match config.feature_mode {
            FeatureMode::InSample => (home, away),
            FeatureMode::LeaveOneOut => {
                let mut home = home;
                let mut away = away;
                home.shed(m, true);
                away.shed(m, false);
                if home.matches_played == 0 || away.matches_played == 0 {
                    continue;
                }
                (home, away)
            }
        };
        rows.push((
            MatchFeatures::from_tallies(&home, &away, config.exponent),
            class_index(m.result),
        ));
    }
    rows
}

/// Synthetic minority oversampling: each underrepresented class is topped
/// up with interpolations between a random member and one of its nearest
/// same-class neighbors, until all three classes match the majority count.
fn oversample(
    mut rows: Vec<[f64; FEATURE_COUNT]>,
    mut labels: Vec<usize>,
    rng: &mut StdRng,
) -> (Vec<[f64; FEATURE_COUNT]>, Vec<usize>) {
    let mut counts = [0usize; CLASS_COUNT];
    for &label in &labels {
        counts[label] += 1;
    }
    let target = counts.iter().copied().max().unwrap_or(0);
    let before = rows.len();

    for class in 0..CLASS_COUNT {
        if counts[class] == 0 || counts[class] >= target {
            continue;
        }
        let members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label == class)
            .map(|(i, _)| i)
            .collect();
        let neighbors = nearest_neighbors(&rows, &members);

        for _ in 0..(target - counts[class]) {
            let pick = rng.gen_range(0..members.len());
            let base = rows[members[pick]];
            let synthetic = if neighbors[pick].is_empty() {
                base
            } else {
                let other = rows[neighbors[pick][rng.gen_range(0..neighbors[pick].len())]];
                let blend: f64 = rng.gen_range(0.0..1.0);
                let mut row = [0.0; FEATURE_COUNT];
                for j in 0..FEATURE_COUNT {
                    row[j] = base[j] + blend * (other[j] - base[j]);
                }
                row
            };
            rows.push(synthetic);
            labels.push(class);
        }
    }

    log::debug!("oversampling: {before} rows -> {}", rows.len());
    (rows, labels)
}

/// For every member index, the (at most) `SMOTE_NEIGHBORS` closest other
/// members by euclidean distance.
fn nearest_neighbors(rows: &[[f64; FEATURE_COUNT]], members: &[usize]) -> Vec<Vec<usize>> {
    members
        .iter()
        .map(|&i| {
            let mut others: Vec<(f64, usize)> = members
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| (distance_sq(&rows[i], &rows[j]), j))
                .collect();
            others.sort_by(|a, b| a.0.total_cmp(&b.0));
            others
                .into_iter()
                .take(SMOTE_NEIGHBORS)
                .map(|(_, j)| j)
                .collect()
        })
        .collect()
}

fn distance_sq(a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
    let mut sum = 0.0;
    for j in 0..FEATURE_COUNT {
        let d = a[j] - b[j];
        sum += d * d;
    }
    sum
}

fn to_matrix(rows: &[[f64; FEATURE_COUNT]], indices: &[usize]) -> Array2<f64> {
    let mut x = Array2::zeros((indices.len(), FEATURE_COUNT));
    for (r, &i) in indices.iter().enumerate() {
        for j in 0..FEATURE_COUNT {
            x[[r, j]] = rows[i][j];
        }
    }
    x
}

/// Batch-gradient softmax regression with an L2 penalty, run until the
/// weight update falls under the tolerance or the iteration cap is hit.
fn train_softmax(
    x: &Array2<f64>,
    y: &[usize],
    config: &ClassifierConfig,
) -> (Array2<f64>, Array1<f64>) {
    let n = x.nrows();
    let scale = 1.0 / n.max(1) as f64;
    let mut weights = Array2::<f64>::zeros((CLASS_COUNT, FEATURE_COUNT));
    let mut intercepts = Array1::<f64>::zeros(CLASS_COUNT);

    for iteration in 0..config.max_iterations {
        let mut grad_w = Array2::<f64>::zeros((CLASS_COUNT, FEATURE_COUNT));
        let mut grad_b = Array1::<f64>::zeros(CLASS_COUNT);

        for i in 0..n {
            let mut logits = [0.0; CLASS_COUNT];
            for c in 0..CLASS_COUNT {
                let mut z = intercepts[c];
                for j in 0..FEATURE_COUNT {
                    z += weights[[c, j]] * x[[i, j]];
                }
                logits[c] = z;
            }
            let probs = softmax(logits);
            for c in 0..CLASS_COUNT {
                let err = probs[c] - if y[i] == c { 1.0 } else { 0.0 };
                grad_b[c] += err;
                for j in 0..FEATURE_COUNT {
                    grad_w[[c, j]] += err * x[[i, j]];
                }
            }
        }

        let mut max_step = 0.0_f64;
        for c in 0..CLASS_COUNT {
            for j in 0..FEATURE_COUNT {
                let g = grad_w[[c, j]] * scale + config.l2 * weights[[c, j]] * scale;
                let step = config.learning_rate * g;
                weights[[c, j]] -= step;
                max_step = max_step.max(step.abs());
            }
            let step = config.learning_rate * grad_b[c] * scale;
            intercepts[c] -= step;
            max_step = max_step.max(step.abs());
        }

        if max_step < config.tolerance {
            log::debug!("softmax training converged after {iteration} iterations");
            break;
        }
    }

    (weights, intercepts)
}

/// Max-shifted softmax, safe against overflow for large logits.
fn softmax(logits: [f64; CLASS_COUNT]) -> [f64; CLASS_COUNT] {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut out = [0.0; CLASS_COUNT];
    let mut denom = 0.0;
    for c in 0..CLASS_COUNT {
        out[c] = (logits[c] - max).exp();
        denom += out[c];
    }
    for value in &mut out {
        *value /= denom;
    }
    out
}

/// Argmax over class probabilities; exact ties go to the higher ordinal
/// class, so home outranks draw outranks away.
fn argmax3(probs: &[f64; CLASS_COUNT]) -> usize {
    let mut best = CLASS_COUNT - 1;
    for c in (0..CLASS_COUNT - 1).rev() {
        if probs[c] > probs[best] {
            best = c;
        }
    }
    best
}

/// Rounds each class probability to 3 decimals and folds the rounding
/// residue into the largest class, keeping the sum at exactly 1.0 without
/// ever producing a negative entry.
fn round_probs(probs: &[f64; CLASS_COUNT]) -> [f64; CLASS_COUNT] {
    let mut out = [0.0; CLASS_COUNT];
    for c in 0..CLASS_COUNT {
        out[c] = (probs[c] * 1000.0).round() / 1000.0;
    }
    let residue = 1.0 - out.iter().sum::<f64>();
    let largest = argmax3(&out);
    out[largest] += residue;
    out
}
