// src/edit_distance.rs

//! Levenshtein distance with unit costs for insertion, deletion and
//! substitution, measured in Unicode scalar values.
//!
//! Two interchangeable strategies are provided. [`FullMatrix`] fills the
//! whole `(len(a)+1) x (len(b)+1)` table; [`TwoRow`] runs the same
//! recurrence over two rolling rows after trimming the common prefix and
//! suffix, which is what makes near-identical source files cheap.

use clap::ValueEnum;

pub trait EditDistance: Send + Sync {
    fn distance(&self, a: &str, b: &str) -> usize;

    fn name(&self) -> &'static str;
}

/// Full dynamic-programming table, O(n*m) time and space
#[derive(Debug, Clone, Copy, Default)]
pub struct FullMatrix;

impl EditDistance for FullMatrix {
    fn distance(&self, a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let rows = a.len() + 1;
        let cols = b.len() + 1;

        let mut matrix = vec![vec![0usize; cols]; rows];
        for (i, row) in matrix.iter_mut().enumerate() {
            row[0] = i;
        }
        for (j, cell) in matrix[0].iter_mut().enumerate() {
            *cell = j;
        }

        for i in 1..rows {
            for j in 1..cols {
                let cost = usize::from(a[i - 1] != b[j - 1]);
                matrix[i][j] = (matrix[i - 1][j] + 1)
                    .min(matrix[i][j - 1] + 1)
                    .min(matrix[i - 1][j - 1] + cost);
            }
        }

        matrix[rows - 1][cols - 1]
    }

    fn name(&self) -> &'static str {
        "full matrix"
    }
}

/// Same recurrence, O(min(n, m)) space
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoRow;

impl EditDistance for TwoRow {
    fn distance(&self, a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();

        let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
        let (a, b) = (&a[prefix..], &b[prefix..]);
        let suffix = a
            .iter()
            .rev()
            .zip(b.iter().rev())
            .take_while(|(x, y)| x == y)
            .count();
        let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

        // Keep the shorter sequence along the row
        let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
        if short.is_empty() {
            return long.len();
        }

        let mut prev: Vec<usize> = (0..=short.len()).collect();
        let mut curr = vec![0usize; short.len() + 1];

        for (i, lc) in long.iter().enumerate() {
            curr[0] = i + 1;
            for (j, sc) in short.iter().enumerate() {
                let cost = usize::from(lc != sc);
                curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        prev[short.len()]
    }

    fn name(&self) -> &'static str {
        "two-row"
    }
}

/// Strategy selector for the command line
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Algorithm {
    /// Rolling two-row table with common prefix/suffix trimming
    #[default]
    TwoRow,
    /// Full (n+1) x (m+1) table
    Matrix,
}

impl Algorithm {
    pub fn strategy(self) -> Box<dyn EditDistance> {
        match self {
            Algorithm::TwoRow => Box::new(TwoRow),
            Algorithm::Matrix => Box::new(FullMatrix),
        }
    }
}
