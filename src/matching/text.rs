//! Text normalization and similarity scoring for transaction descriptions

/// Fold accented Latin characters to their ASCII base
///
/// Covers the range seen in Brazilian bank exports. Characters outside the
/// table pass through unchanged.
pub fn fold_diacritics(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'Ç' => 'C',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// Normalize a description for comparison
///
/// Lowercases, strips diacritics, replaces punctuation with spaces and
/// collapses whitespace. Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(input: &str) -> String {
    let folded = fold_diacritics(&input.to_lowercase());
    let replaced: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Score the similarity of two already-normalized descriptions, 0-100
///
/// 100 for identical strings, 80 when one contains the other, otherwise a
/// bucket derived from the fraction of words common to both over the larger
/// word count: >=70% -> 70, >=50% -> 50, >=30% -> 30, any common word -> 10,
/// none -> 0.
pub fn similarity(a: &str, b: &str) -> u32 {
    if a == b {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a.contains(b) || b.contains(a) {
        return 80;
    }

    let words_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let words_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    let common = words_a.intersection(&words_b).count();
    let larger = words_a.len().max(words_b.len());

    if larger == 0 {
        return 0;
    }
    if common * 100 >= larger * 70 {
        70
    } else if common * 100 >= larger * 50 {
        50
    } else if common * 100 >= larger * 30 {
        30
    } else if common > 0 {
        10
    } else {
        0
    }
}
