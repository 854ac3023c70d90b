/// Cell visiting order for a `rows` x `cols` grid: anti-diagonals in zigzag,
/// starting top-left and heading up-right first.
pub fn zigzag_cells(cols: usize, rows: usize) -> Vec<(usize, usize)> {
    let mut cells = Vec::with_capacity(cols * rows);
    if cols == 0 || rows == 0 {
        return cells;
    }

    let (mut row, mut col) = (0usize, 0usize);
    let mut up = true;

    while row < rows && col < cols {
        cells.push((row, col));

        let next = if up {
            row.checked_sub(1).map(|r| (r, col + 1))
        } else {
            col.checked_sub(1).map(|c| (row + 1, c))
        };

        match next {
            Some((r, c)) if r < rows && c < cols => {
                row = r;
                col = c;
            }
            _ => {
                if up {
                    if col == cols - 1 {
                        row += 1;
                    } else {
                        col += 1;
                    }
                } else if row == rows - 1 {
                    col += 1;
                } else {
                    row += 1;
                }
                up = !up;
            }
        }
    }
    cells
}

/// Reorders `items` so that reading the grid row by row walks the sorted
/// sequence along zigzag diagonals. `items.len()` must equal `cols * rows`.
pub fn rearrange<T>(items: Vec<T>, cols: usize, rows: usize) -> Vec<T> {
    debug_assert_eq!(items.len(), cols * rows);

    let mut grid: Vec<Option<T>> = std::iter::repeat_with(|| None).take(cols * rows).collect();
    for (item, (row, col)) in items.into_iter().zip(zigzag_cells(cols, rows)) {
        grid[row * cols + col] = Some(item);
    }
    grid.into_iter().flatten().collect()
}
