//! Adjacency model for links between groups.
//!
//! `matrix[i][j] == true` means the first `links_per_pair` nodes of group `i`
//! are attached to the network of group `j`. The relation is directed and is
//! never symmetrised. Diagonal entries are ignored.

use std::fmt;
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::error::MeshError;

/// Square boolean matrix of size `group_count x group_count`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjacencyMatrix {
    rows: Vec<Vec<bool>>,
}

impl AdjacencyMatrix {
    /// Matrix without any link.
    pub fn empty(group_count: usize) -> Self {
        Self {
            rows: vec![vec![false; group_count]; group_count],
        }
    }

    /// Wrap rows as given. Shape is checked by [`validate`].
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<bool>] {
        &self.rows
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// True when group `from` reaches into group `to`. Always false on the diagonal.
    pub fn is_linked(&self, from: usize, to: usize) -> bool {
        from != to
            && self
                .rows
                .get(from)
                .and_then(|row| row.get(to))
                .copied()
                .unwrap_or(false)
    }

    pub fn set(&mut self, from: usize, to: usize, linked: bool) {
        if from == to {
            return;
        }
        if let Some(cell) = self.rows.get_mut(from).and_then(|row| row.get_mut(to)) {
            *cell = linked;
        }
    }

    /// Ordered pairs `(from, to)` that carry a link, row by row.
    pub fn links(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.rows.len();
        (0..n)
            .flat_map(move |i| (0..n).map(move |j| (i, j)))
            .filter(move |&(i, j)| self.is_linked(i, j))
    }
}

impl fmt::Display for AdjacencyMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.rows.len();
        writeln!(f, "The adjacency matrix is:")?;
        write!(f, "  ")?;
        for i in 0..n {
            write!(f, "{} ", i)?;
        }
        writeln!(f)?;
        for i in 0..n {
            write!(f, "{} ", i)?;
            for j in 0..n {
                let cell = if i == j {
                    "X"
                } else if self.is_linked(i, j) {
                    "1"
                } else {
                    "0"
                };
                write!(f, "{} ", cell)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Reject matrices whose row count differs from `group_count` or that are not square.
pub fn validate(matrix: &AdjacencyMatrix, group_count: usize) -> Result<(), MeshError> {
    if matrix.rows.len() != group_count {
        return Err(MeshError::InvalidTopology(format!(
            "the number of networks ({}) is not equal to the number of rows in the matrix ({})",
            group_count,
            matrix.rows.len()
        )));
    }
    if let Some((i, row)) = matrix.rows.iter().enumerate().find(|(_, row)| row.len() != group_count) {
        return Err(MeshError::InvalidTopology(format!(
            "the matrix is not square: row {} has {} entries, expected {}",
            i,
            row.len(),
            group_count
        )));
    }
    Ok(())
}

/// Obtain the adjacency matrix for `group_count` groups.
///
/// A `supplied` matrix is validated and returned as is. Otherwise the user is
/// asked a Y/N question for every ordered pair `(i, j)`, `i != j`, and the
/// result is shown back for confirmation until accepted. With a single group
/// there is nothing to ask and the trivial matrix is returned.
pub fn acquire<R: BufRead, W: Write>(
    group_count: usize,
    supplied: Option<AdjacencyMatrix>,
    input: &mut R,
    output: &mut W,
) -> Result<AdjacencyMatrix, MeshError> {
    if let Some(matrix) = supplied {
        validate(&matrix, group_count)?;
        return Ok(matrix);
    }
    if group_count <= 1 {
        return Ok(AdjacencyMatrix::empty(group_count));
    }

    writeln!(output, "Please reply to the following questions to create the adjacency matrix:")?;
    loop {
        let mut matrix = AdjacencyMatrix::empty(group_count);
        for i in 0..group_count {
            for j in 0..group_count {
                if i == j {
                    continue;
                }
                let question = format!("Do you want a link between network {} and network {} (Y/N): ", i, j);
                matrix.set(i, j, ask_yes_no(input, output, &question)?);
            }
        }
        write!(output, "{}", matrix)?;
        if ask_yes_no(input, output, "Is the adjacency matrix correct?(Y/N): ")? {
            return Ok(matrix);
        }
    }
}

fn ask_yes_no<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<bool, MeshError> {
    write!(output, "{}", question)?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(MeshError::InvalidTopology(
            "input ended before the adjacency matrix was confirmed".to_string(),
        ));
    }
    Ok(line.trim().eq_ignore_ascii_case("y"))
}
