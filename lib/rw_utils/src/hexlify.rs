//! Hexadecimal rendering of byte slices, used when reporting binary differences.

#[must_use]
pub fn hexlify(arr: &[u8]) -> String {
    arr.iter()
        .map(|x| format!("{x:02x}"))
        .collect::<Vec<String>>()
        .concat()
}

/// Returns the offset of the first byte that differs between `left` and
/// `right`, or the length of the shortest one if one is a prefix of the other.
/// `None` means both slices are identical.
#[must_use]
pub fn first_difference(left: &[u8], right: &[u8]) -> Option<usize> {
    if left == right {
        return None;
    }
    let common = left.len().min(right.len());
    Some(
        left.iter()
            .zip(right.iter())
            .position(|(l, r)| l != r)
            .unwrap_or(common),
    )
}

/// Renders the bytes around `offset` (at most `radius` bytes on each side).
#[must_use]
pub fn window(arr: &[u8], offset: usize, radius: usize) -> String {
    let start = offset.saturating_sub(radius);
    let end = (offset + radius).min(arr.len());
    if start >= end {
        return String::new();
    }
    hexlify(&arr[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hexlify_test() {
        assert_eq!(hexlify(&[15, 60, 99]), String::from("0f3c63"));
    }

    #[test]
    fn first_difference_test() {
        assert_eq!(first_difference(&[1, 2, 3], &[1, 2, 3]), None);
        assert_eq!(first_difference(&[1, 2, 3], &[1, 4, 3]), Some(1));
        assert_eq!(first_difference(&[1, 2], &[1, 2, 3]), Some(2));
    }

    #[test]
    fn window_test() {
        let data = [0u8, 1, 2, 3, 4, 5, 6, 7];
        assert_eq!(window(&data, 4, 2), "02030405");
        assert_eq!(window(&data, 0, 2), "0001");
        assert_eq!(window(&data, 9, 1), "");
    }
}
