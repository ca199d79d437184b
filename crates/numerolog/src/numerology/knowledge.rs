//! Meanings of numbers, used as context for the language model.

use crate::models::Language;

/// Meaning of a life path number in one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifePathMeaning {
    /// Archetype name.
    pub name: &'static str,
    /// Keywords.
    pub short: &'static str,
    /// A few sentences describing the number.
    pub description: &'static str,
}

/// Meaning of one cell of the Pythagoras square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixMeaning {
    /// What the cell measures.
    pub name: &'static str,
    /// Interpretation for the cell's count.
    pub interpretation: &'static str,
}

struct LifePathEntry {
    number: u32,
    ru: LifePathMeaning,
    en: LifePathMeaning,
}

const fn meaning(
    name: &'static str,
    short: &'static str,
    description: &'static str,
) -> LifePathMeaning {
    LifePathMeaning {
        name,
        short,
        description,
    }
}

const LIFE_PATHS: [LifePathEntry; 12] = [
    LifePathEntry {
        number: 1,
        ru: meaning(
            "Лидер",
            "Независимость, амбиции, новаторство",
            "Ты прирождённый лидер с сильной волей. Тебе легко начинать новое и вести за собой. \
             Сильные стороны: решительность, смелость. Над чем работать: нетерпеливость, упрямство.",
        ),
        en: meaning(
            "Leader",
            "Independence, ambition, innovation",
            "You are a natural leader with a strong will. Starting new things and inspiring others comes easily. \
             Strengths: determination, courage. Areas to work on: impatience, stubbornness.",
        ),
    },
    LifePathEntry {
        number: 2,
        ru: meaning(
            "Дипломат",
            "Сотрудничество, чувствительность, гармония",
            "Ты миротворец, который чувствует настроение других и находит компромиссы. \
             Сильные стороны: эмпатия, терпение. Над чем работать: нерешительность, избегание конфликтов.",
        ),
        en: meaning(
            "Diplomat",
            "Cooperation, sensitivity, harmony",
            "You are a peacemaker who senses others' moods and finds compromises. \
             Strengths: empathy, patience. Areas to work on: indecisiveness, conflict avoidance.",
        ),
    },
    LifePathEntry {
        number: 3,
        ru: meaning(
            "Творец",
            "Творчество, самовыражение, оптимизм",
            "Ты творческая личность с богатым воображением, люди тянутся к твоему оптимизму. \
             Сильные стороны: креативность, общительность. Над чем работать: рассеянность, поверхностность.",
        ),
        en: meaning(
            "Creator",
            "Creativity, self-expression, optimism",
            "You are a creative soul with a rich imagination, and people are drawn to your optimism. \
             Strengths: creativity, sociability. Areas to work on: scattered focus, superficiality.",
        ),
    },
    LifePathEntry {
        number: 4,
        ru: meaning(
            "Строитель",
            "Стабильность, порядок, трудолюбие",
            "Ты надёжный и практичный человек, который во всём строит прочный фундамент. \
             Сильные стороны: организованность, дисциплина. Над чем работать: негибкость, рутина.",
        ),
        en: meaning(
            "Builder",
            "Stability, order, hard work",
            "You are reliable and practical and build solid foundations in everything. \
             Strengths: organization, discipline. Areas to work on: inflexibility, routine.",
        ),
    },
    LifePathEntry {
        number: 5,
        ru: meaning(
            "Искатель",
            "Свобода, перемены, приключения",
            "Ты свободолюбивая душа, которой нужны новые впечатления и разнообразие. \
             Сильные стороны: адаптивность, любознательность. Над чем работать: непостоянство, излишества.",
        ),
        en: meaning(
            "Adventurer",
            "Freedom, change, adventure",
            "You are a freedom-loving soul who needs new experiences and variety. \
             Strengths: adaptability, curiosity. Areas to work on: inconsistency, excess.",
        ),
    },
    LifePathEntry {
        number: 6,
        ru: meaning(
            "Хранитель",
            "Забота, ответственность, семья",
            "Для тебя главное семья и близкие, ты умеешь создавать уют и гармонию. \
             Сильные стороны: заботливость, верность. Над чем работать: гиперопека, перфекционизм.",
        ),
        en: meaning(
            "Nurturer",
            "Care, responsibility, family",
            "Family and loved ones come first for you, and you create comfort and harmony. \
             Strengths: nurturing, loyalty. Areas to work on: overprotectiveness, perfectionism.",
        ),
    },
    LifePathEntry {
        number: 7,
        ru: meaning(
            "Мыслитель",
            "Анализ, духовность, поиск истины",
            "Ты глубокий мыслитель, которому важно докопаться до сути вещей. \
             Сильные стороны: аналитический ум, интуиция. Над чем работать: замкнутость, недоверие.",
        ),
        en: meaning(
            "Seeker",
            "Analysis, spirituality, truth-seeking",
            "You are a deep thinker who needs to get to the heart of things. \
             Strengths: analytical mind, intuition. Areas to work on: isolation, distrust.",
        ),
    },
    LifePathEntry {
        number: 8,
        ru: meaning(
            "Достигатор",
            "Власть, успех, материальное благополучие",
            "Ты нацелен на результат и умеешь управлять ресурсами и людьми. \
             Сильные стороны: деловая хватка, амбициозность. Над чем работать: трудоголизм, контроль.",
        ),
        en: meaning(
            "Achiever",
            "Power, success, material abundance",
            "You are results-driven and good at managing resources and people. \
             Strengths: business sense, ambition. Areas to work on: workaholism, control.",
        ),
    },
    LifePathEntry {
        number: 9,
        ru: meaning(
            "Гуманист",
            "Мудрость, сострадание, служение",
            "Ты видишь общую картину и хочешь сделать мир лучше. \
             Сильные стороны: щедрость, мудрость. Над чем работать: жертвенность, отстранённость.",
        ),
        en: meaning(
            "Humanitarian",
            "Wisdom, compassion, service",
            "You see the big picture and want to make the world better. \
             Strengths: generosity, wisdom. Areas to work on: self-sacrifice, detachment.",
        ),
    },
    LifePathEntry {
        number: 11,
        ru: meaning(
            "Мастер интуиции",
            "Духовное озарение, вдохновение, высшая чувствительность",
            "Мастер-число с сильной интуицией и даром вдохновлять других. \
             Сильные стороны: прозорливость, идеализм. Над чем работать: тревожность, нервное напряжение.",
        ),
        en: meaning(
            "Master Intuitive",
            "Spiritual illumination, inspiration, heightened sensitivity",
            "A master number with strong intuition and a gift for inspiring others. \
             Strengths: insight, idealism. Areas to work on: anxiety, nervous tension.",
        ),
    },
    LifePathEntry {
        number: 22,
        ru: meaning(
            "Мастер-строитель",
            "Великие достижения, практическая мудрость, глобальное видение",
            "Мастер-число, способное воплощать большие идеи в реальность. \
             Сильные стороны: масштаб, практичность. Над чем работать: давление ожиданий.",
        ),
        en: meaning(
            "Master Builder",
            "Great achievements, practical wisdom, global vision",
            "A master number able to turn big ideas into reality. \
             Strengths: vision, practicality. Areas to work on: pressure of expectations.",
        ),
    },
    LifePathEntry {
        number: 33,
        ru: meaning(
            "Мастер-учитель",
            "Бескорыстное служение, духовное учительство, целительство",
            "Редкое мастер-число учителя и целителя, которое помогает через любовь. \
             Сильные стороны: сострадание, мудрость. Над чем работать: самопожертвование.",
        ),
        en: meaning(
            "Master Teacher",
            "Selfless service, spiritual teaching, healing",
            "A rare master number of the teacher and healer who helps through love. \
             Strengths: compassion, wisdom. Areas to work on: self-sacrifice.",
        ),
    },
];

const PERSONAL_YEARS: [(&str, &str); 9] = [
    (
        "Год новых начинаний. Время запускать проекты и заводить знакомства.",
        "Year of new beginnings. Time to start projects and make new connections.",
    ),
    (
        "Год партнёрства и терпения. Фокус на отношениях, не торопи события.",
        "Year of partnership and patience. Focus on relationships, don't rush things.",
    ),
    (
        "Год творчества и общения. Выражай себя, энергия на твоей стороне.",
        "Year of creativity and communication. Express yourself, the energy is on your side.",
    ),
    (
        "Год строительства фундамента. Работа и дисциплина закладывают основу.",
        "Year of building foundations. Work and discipline lay the groundwork.",
    ),
    (
        "Год перемен и свободы. Будь гибким и пробуй новое.",
        "Year of change and freedom. Be flexible and try new things.",
    ),
    (
        "Год семьи и ответственности. Фокус на доме и близких.",
        "Year of family and responsibility. Focus on home and loved ones.",
    ),
    (
        "Год самопознания и отдыха. Время учиться и анализировать.",
        "Year of self-discovery and rest. Time to learn and reflect.",
    ),
    (
        "Год достижений и финансов. Карьерный рост и признание.",
        "Year of achievements and finances. Career growth and recognition.",
    ),
    (
        "Год завершения цикла. Отпусти старое и готовься к новому.",
        "Year of completion. Let go of the old and prepare for the new.",
    ),
];

/// Cell name followed by interpretations for counts 0, 1, 2, 3 and 4+.
type MatrixCell = (&'static str, [&'static str; 5]);

const MATRIX_RU: [MatrixCell; 9] = [
    ("Характер, воля, эго", ["Слабая воля, зависимость от других", "Мягкий характер, дипломатичность", "Здоровая самооценка, уверенность", "Сильный характер, лидерство", "Деспотичность, эгоцентризм"]),
    ("Энергия, здоровье", ["Энергии мало, нужно беречь силы", "Энергии немного, важен отдых", "Нормальный уровень энергии", "Много энергии, можно делиться", "Избыток энергии, экстрасенсорика"]),
    ("Интерес, познание", ["Интерес к наукам нужно развивать", "Есть интерес к знаниям", "Хорошие способности к обучению", "Склонность к науке", "Сильный исследовательский ум"]),
    ("Здоровье, физическое тело", ["Нужно следить за здоровьем", "Среднее здоровье", "Хорошее здоровье", "Крепкое здоровье", "Отличное здоровье, выносливость"]),
    ("Логика, интуиция", ["Больше интуиции, чем логики", "Развитая интуиция", "Баланс логики и интуиции", "Сильная логика", "Очень сильная логика, аналитик"]),
    ("Труд, мастерство", ["Не любит физический труд", "Может работать по необходимости", "Любит работать руками", "Мастер на все руки", "Трудоголик"]),
    ("Удача, талант", ["Удачу нужно создавать самому", "Есть везение в жизни", "Заметное везение", "Сильная удача, талант", "Особый дар, таланты"]),
    ("Долг, ответственность", ["Свободен от чувства долга", "Развитое чувство долга", "Сильное чувство долга", "Очень ответственный", "Гиперответственность"]),
    ("Память, ум", ["Память нужно тренировать", "Хорошая память", "Отличная память", "Феноменальная память", "Возможна перегрузка информацией"]),
];

const MATRIX_EN: [MatrixCell; 9] = [
    ("Character, will, ego", ["Weak will, dependency on others", "Soft character, diplomacy", "Healthy self-esteem, confidence", "Strong character, leadership", "Domineering, self-centered"]),
    ("Energy, health", ["Low energy, conserve your strength", "Some energy, rest matters", "Normal energy level", "Plenty of energy to share", "Surplus energy, extrasensory gifts"]),
    ("Interest, cognition", ["Curiosity needs developing", "Interest in knowledge", "Good learning ability", "Inclination to science", "Strong research mind"]),
    ("Health, physical body", ["Need to monitor health", "Average health", "Good health", "Strong health", "Excellent health, endurance"]),
    ("Logic, intuition", ["More intuition than logic", "Developed intuition", "Balance of logic and intuition", "Strong logic", "Very strong logic, analyst"]),
    ("Work, craftsmanship", ["Doesn't like physical work", "Can work when necessary", "Likes working with hands", "Jack of all trades", "Workaholic"]),
    ("Luck, talent", ["Need to create your own luck", "Some luck in life", "Noticeable luck", "Strong luck, talent", "Special gift, talents"]),
    ("Duty, responsibility", ["Free from sense of duty", "Developed sense of duty", "Strong sense of duty", "Very responsible", "Hyper-responsibility"]),
    ("Memory, intelligence", ["Memory needs training", "Good memory", "Excellent memory", "Phenomenal memory", "Possible information overload"]),
];

/// Meaning of a life path number. Numbers without an entry are reduced first.
#[must_use]
pub fn life_path_meaning(number: u32, language: Language) -> LifePathMeaning {
    let lookup = |n: u32| LIFE_PATHS.iter().find(|entry| entry.number == n);
    let entry = lookup(number)
        .or_else(|| lookup(super::reduce(number, true)))
        .or_else(|| lookup(super::reduce(number, false)))
        .unwrap_or(&LIFE_PATHS[0]);

    match language {
        Language::Ru => entry.ru,
        Language::En => entry.en,
    }
}

/// Meaning of a personal year; unknown numbers fall back to year 1.
#[must_use]
pub fn personal_year_meaning(number: u32, language: Language) -> &'static str {
    let index = usize::try_from(number)
        .ok()
        .filter(|n| (1..=9).contains(n))
        .map_or(0, |n| n - 1);
    let (ru, en) = PERSONAL_YEARS[index];
    match language {
        Language::Ru => ru,
        Language::En => en,
    }
}

/// Meaning of a Pythagoras square cell with the given count.
#[must_use]
pub fn matrix_meaning(position: u8, count: u32, language: Language) -> Option<MatrixMeaning> {
    if !(1..=9).contains(&position) {
        return None;
    }
    let table = match language {
        Language::Ru => &MATRIX_RU,
        Language::En => &MATRIX_EN,
    };
    let (name, interpretations) = table[usize::from(position - 1)];
    let bucket = usize::try_from(count.min(4)).unwrap_or(4);
    Some(MatrixMeaning {
        name,
        interpretation: interpretations[bucket],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_life_path_meaning_direct() {
        assert_eq!(life_path_meaning(1, Language::En).name, "Leader");
        assert_eq!(life_path_meaning(1, Language::Ru).name, "Лидер");
        assert_eq!(life_path_meaning(33, Language::En).name, "Master Teacher");
    }

    #[test]
    fn test_life_path_meaning_reduces_unknown() {
        // 44 -> 8
        assert_eq!(life_path_meaning(44, Language::En).name, "Achiever");
    }

    #[test]
    fn test_personal_year_meaning() {
        assert!(personal_year_meaning(1, Language::En).starts_with("Year of new beginnings"));
        assert!(personal_year_meaning(9, Language::En).contains("completion"));
        assert_eq!(
            personal_year_meaning(11, Language::Ru),
            personal_year_meaning(1, Language::Ru)
        );
    }

    #[test]
    fn test_matrix_meaning_buckets() {
        let zero = matrix_meaning(1, 0, Language::En).unwrap();
        assert_eq!(zero.name, "Character, will, ego");
        assert_eq!(zero.interpretation, "Weak will, dependency on others");

        let many = matrix_meaning(9, 7, Language::En).unwrap();
        assert_eq!(many.interpretation, "Possible information overload");
    }

    #[test]
    fn test_matrix_meaning_out_of_range() {
        assert!(matrix_meaning(0, 1, Language::En).is_none());
        assert!(matrix_meaning(10, 1, Language::Ru).is_none());
    }
}
