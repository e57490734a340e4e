//! Splitting of overlong inputs and pooling of their vectors.

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Breaks at the last whitespace in the second half of a window when there is
/// one, otherwise at the character limit. Short text is returned as-is.
pub fn split_for_embedding(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + max_chars).min(chars.len());
        if end < chars.len() {
            let window = &chars[start..end];
            if let Some(ws) = window.iter().rposition(|c| c.is_whitespace()) {
                if ws >= max_chars / 2 {
                    end = start + ws + 1;
                }
            }
        }

        let piece: String = chars[start..end].iter().collect();
        if !piece.trim().is_empty() {
            pieces.push(piece);
        }
        start = end;
    }

    if pieces.is_empty() {
        pieces.push(text.chars().take(max_chars).collect());
    }
    pieces
}

/// Component-wise mean of equally long vectors.
pub fn mean_pool(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };

    let mut pooled = vec![0.0f32; first.len()];
    for vector in vectors {
        for (acc, value) in pooled.iter_mut().zip(vector) {
            *acc += value;
        }
    }
    let n = vectors.len() as f32;
    for acc in &mut pooled {
        *acc /= n;
    }
    pooled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(split_for_embedding("hello", 10), vec!["hello"]);
    }

    #[test]
    fn test_split_prefers_whitespace() {
        let pieces = split_for_embedding("aaaa bbbb cccc", 10);
        assert_eq!(pieces, vec!["aaaa bbbb ", "cccc"]);
        assert!(pieces.iter().all(|p| p.chars().count() <= 10));
    }

    #[test]
    fn test_split_hard_break_without_whitespace() {
        let pieces = split_for_embedding(&"x".repeat(25), 10);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces.concat(), "x".repeat(25));
    }

    #[test]
    fn test_mean_pool() {
        let pooled = mean_pool(&[vec![1.0, 0.0, 2.0], vec![3.0, 2.0, 0.0]]);
        assert_eq!(pooled, vec![2.0, 1.0, 1.0]);
        assert!(mean_pool(&[]).is_empty());
    }
}
