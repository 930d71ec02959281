//! Line-oriented terminal front end for quizzes and review pages.

use std::fmt::Write as _;
use std::io;
use std::time::Duration;

use services::review::{QuestionCard, SavedList, WrongList};
use services::sessions::{AUTO_ADVANCE_DELAY, LiveQuiz, QuizSession, SessionPhase, Step};
use services::{ProgressLedger, SessionError};
use theory_core::model::{LicenseType, OptionKey, QuestionCatalog, QuestionRef};
use theory_core::time::iso_timestamp;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub type Input = Lines<BufReader<Stdin>>;

pub fn stdin_lines() -> Input {
    BufReader::new(tokio::io::stdin()).lines()
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuizInput {
    Select(OptionKey),
    Reveal,
    Next,
    Previous,
    Goto(usize),
    Bookmark,
    ToggleAutoNext,
    Finish,
    Continue,
    Restart,
    Help,
    Quit,
}

fn parse_quiz_input(line: &str) -> Option<QuizInput> {
    let line = line.trim();
    if let Ok(option) = line.parse::<OptionKey>() {
        return Some(QuizInput::Select(option));
    }
    let mut parts = line.split_whitespace();
    let command = match parts.next()? {
        "r" => QuizInput::Reveal,
        "n" => QuizInput::Next,
        "p" => QuizInput::Previous,
        "g" => {
            let number: usize = parts.next()?.parse().ok()?;
            QuizInput::Goto(number.checked_sub(1)?)
        }
        "m" => QuizInput::Bookmark,
        "t" => QuizInput::ToggleAutoNext,
        "f" => QuizInput::Finish,
        "k" => QuizInput::Continue,
        "s" => QuizInput::Restart,
        "h" | "?" => QuizInput::Help,
        "q" => QuizInput::Quit,
        _ => return None,
    };
    Some(command)
}

const QUIZ_HELP: &str = "\
  1-4 / a-d  select an option
  r          reveal the answer
  n / p      next / previous question
  g <n>      go to question n
  m          bookmark or unbookmark this question
  t          switch auto-next on or off
  f          finish and grade
  k          keep answering after time runs out
  s          start over
  q          quit";

fn describe_question(session: &QuizSession) -> String {
    let progress = session.progress();
    let index = session.current_index();
    let question = session.current_question();
    let answer = session.answer(index);
    let revealed = session.is_revealed(index);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n[quiz {} | {}/{} | answered {} | {}]",
        session.quiz(),
        index + 1,
        progress.total,
        progress.answered,
        progress.clock_label()
    );
    let _ = writeln!(out, "{}", question.question);
    for (key, text) in question.options() {
        let picked = answer.is_some_and(|a| a.selected() == key);
        let marker = match (revealed, picked, key == question.answer) {
            (true, _, true) => "✓",
            (true, true, false) => "✗",
            (_, true, _) => ">",
            _ => " ",
        };
        let _ = writeln!(out, " {marker} {}) {text}", key.letter());
    }
    out
}

fn describe_finish(session: &QuizSession) -> String {
    let Some(score) = session.score() else {
        return String::new();
    };
    let mut out = format!("\nScore: {}/{}", score.score, score.total);
    let missed: Vec<String> = (0..session.total())
        .filter(|index| !session.answer(*index).is_some_and(|a| a.is_correct()))
        .map(|index| (index + 1).to_string())
        .collect();
    if !missed.is_empty() {
        let _ = write!(out, "\nMissed: {}", missed.join(", "));
    }
    out
}

async fn show(live: &LiveQuiz) {
    println!("{}", live.with_session(describe_question).await);
}

/// Drive a live quiz from stdin until the learner quits or input ends.
///
/// # Errors
///
/// Returns `io::Error` if stdin cannot be read.
pub async fn run_quiz(mut live: LiveQuiz, input: &mut Input) -> io::Result<()> {
    let mut phases = live.phase_changes();
    println!("Type h for help.");
    show(&live).await;

    loop {
        let line = tokio::select! {
            line = input.next_line() => line?,
            changed = phases.changed() => {
                if changed.is_err() {
                    break;
                }
                if *phases.borrow_and_update() == SessionPhase::TimeExpired {
                    println!("\nTime is up. f: finish now, k: keep answering");
                }
                continue;
            }
        };
        let Some(line) = line else {
            break;
        };
        let Some(command) = parse_quiz_input(&line) else {
            println!("unrecognised input; h for help");
            continue;
        };

        let result = match command {
            QuizInput::Select(option) => live.select(option).await,
            QuizInput::Reveal => live.reveal().await.map(|_| ()),
            QuizInput::Next => match live.advance().await {
                Ok(Step::Finished(_)) => {
                    println!("{}", live.with_session(describe_finish).await);
                    continue;
                }
                other => other.map(|_| ()),
            },
            QuizInput::Previous => live.retreat().await.map(|_| ()),
            QuizInput::Goto(index) => live.jump_to(index).await,
            QuizInput::Bookmark => match live.toggle_bookmark().await {
                Ok(event) if event.now_bookmarked => {
                    println!("bookmarked");
                    continue;
                }
                Ok(_) => {
                    println!("bookmark removed");
                    continue;
                }
                Err(err) => Err(err),
            },
            QuizInput::ToggleAutoNext => {
                let enabled = !live.auto_advance().await;
                live.set_auto_advance(enabled).await;
                println!("auto-next {}", if enabled { "on" } else { "off" });
                continue;
            }
            QuizInput::Finish => match live.finish().await {
                Ok(_) => {
                    println!("{}", live.with_session(describe_finish).await);
                    println!("s: start over, q: quit");
                    continue;
                }
                Err(err) => Err(err),
            },
            QuizInput::Continue => live.continue_after_expiry().await,
            QuizInput::Restart => {
                live.restart().await;
                Ok(())
            }
            QuizInput::Help => {
                println!("{QUIZ_HELP}");
                continue;
            }
            QuizInput::Quit => break,
        };

        match result {
            Ok(()) => {
                if live.with_session(|s| s.pending_advance().is_some()).await {
                    tokio::time::sleep(AUTO_ADVANCE_DELAY + Duration::from_millis(20)).await;
                }
                show(&live).await;
            }
            Err(SessionError::Completed) => println!("quiz finished; s: start over, q: quit"),
            Err(err) => println!("{err}"),
        }
    }
    Ok(())
}

//
// ─── REVIEW PAGES ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReviewInput {
    More,
    Answer(usize, OptionKey),
    Bookmark(usize),
    Dismiss(usize),
    Quit,
}

fn parse_review_input(line: &str) -> Option<ReviewInput> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("m");
    match command {
        "m" => Some(ReviewInput::More),
        "b" => position(parts.next()).map(ReviewInput::Bookmark),
        "d" => position(parts.next()).map(ReviewInput::Dismiss),
        "a" => {
            let index = position(parts.next())?;
            let option = parts.next()?.parse().ok()?;
            Some(ReviewInput::Answer(index, option))
        }
        "q" => Some(ReviewInput::Quit),
        _ => None,
    }
}

/// 1-based list position to index.
fn position(raw: Option<&str>) -> Option<usize> {
    raw?.parse::<usize>().ok()?.checked_sub(1)
}

fn describe_card(position: usize, card: &QuestionCard, suffix: &str) -> String {
    let question = card.question();
    let mut out = format!(
        "\n{}. [quiz {} #{}]{}{suffix}\n{}\n",
        position + 1,
        card.key().quiz,
        card.key().index + 1,
        if card.is_bookmarked() { " *" } else { "" },
        question.question
    );
    for (key, text) in question.options() {
        let marker = match (card.is_revealed(), card.selected() == Some(key), key == question.answer) {
            (true, _, true) => "✓",
            (true, true, false) => "✗",
            _ => " ",
        };
        let _ = writeln!(out, " {marker} {}) {text}", key.letter());
    }
    out
}

const REVIEW_HELP: &str =
    "Enter/m: more | a <n> <option>: answer | b <n>: toggle bookmark | q: quit";

/// Browse bookmarked questions.
///
/// # Errors
///
/// Returns an error if the ledger or stdin cannot be read.
pub async fn run_saved(
    ledger: &ProgressLedger,
    catalog: &dyn QuestionCatalog,
    license: LicenseType,
    input: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut list = SavedList::load(ledger, catalog, license).await?;
    println!("Saved questions, {}: {}", license.display_name(), list.len());
    let mut shown = 0;

    loop {
        for (position, card) in list.visible().iter().enumerate().skip(shown) {
            print!("{}", describe_card(position, card, ""));
        }
        shown = list.visible().len();
        if list.is_empty() {
            println!("No saved questions.");
            return Ok(());
        }
        println!("\n{REVIEW_HELP}");

        let Some(line) = input.next_line().await? else {
            return Ok(());
        };
        match parse_review_input(&line) {
            Some(ReviewInput::More) => {
                if list.load_more() == 0 {
                    println!("end of list");
                }
            }
            Some(ReviewInput::Answer(position, option)) => {
                let Some(key) = visible_key(list.visible(), position) else {
                    println!("no item {}", position + 1);
                    continue;
                };
                if let Some(card) = list.item_mut(key) {
                    answer_card(card, option);
                }
            }
            Some(ReviewInput::Bookmark(position)) => {
                let Some(key) = visible_key(list.visible(), position) else {
                    println!("no item {}", position + 1);
                    continue;
                };
                match list.toggle_bookmark(ledger, key).await {
                    Ok(_) => {
                        println!("removed {key}");
                        shown = 0;
                    }
                    Err(err) => println!("{err}"),
                }
            }
            Some(ReviewInput::Dismiss(_)) | None => println!("{REVIEW_HELP}"),
            Some(ReviewInput::Quit) => return Ok(()),
        }
    }
}

/// Browse frequently missed questions.
///
/// # Errors
///
/// Returns an error if the ledger or stdin cannot be read.
pub async fn run_wrong(
    ledger: &ProgressLedger,
    catalog: &dyn QuestionCatalog,
    license: LicenseType,
    input: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut list = WrongList::load(ledger, catalog, license).await?;
    println!("Missed questions, {}: {}", license.display_name(), list.len());
    let mut shown = 0;

    loop {
        for (position, item) in list.visible().iter().enumerate().skip(shown) {
            let suffix = format!(" missed {}x", item.count);
            print!("{}", describe_card(position, &item.card, &suffix));
        }
        shown = list.visible().len();
        if list.is_empty() {
            println!("No missed questions.");
            return Ok(());
        }
        println!("\n{REVIEW_HELP} | d <n>: dismiss");

        let Some(line) = input.next_line().await? else {
            return Ok(());
        };
        let cards: Vec<QuestionRef> = list.visible().iter().map(|item| item.card.key()).collect();
        match parse_review_input(&line) {
            Some(ReviewInput::More) => {
                if list.load_more() == 0 {
                    println!("end of list");
                }
            }
            Some(ReviewInput::Answer(position, option)) => match cards.get(position) {
                Some(key) => {
                    if let Some(item) = list.item_mut(*key) {
                        answer_card(&mut item.card, option);
                    }
                }
                None => println!("no item {}", position + 1),
            },
            Some(ReviewInput::Bookmark(position)) => match cards.get(position) {
                Some(key) => match list.toggle_bookmark(ledger, *key).await {
                    Ok(event) if event.now_bookmarked => println!("bookmarked {key}"),
                    Ok(_) => println!("bookmark removed for {key}"),
                    Err(err) => println!("{err}"),
                },
                None => println!("no item {}", position + 1),
            },
            Some(ReviewInput::Dismiss(position)) => match cards.get(position) {
                Some(key) => match list.dismiss(ledger, *key).await {
                    Ok(_) => {
                        println!("dismissed {key}");
                        shown = 0;
                    }
                    Err(err) => println!("{err}"),
                },
                None => println!("no item {}", position + 1),
            },
            Some(ReviewInput::Quit) => return Ok(()),
            None => println!("{REVIEW_HELP} | d <n>: dismiss"),
        }
    }
}

fn visible_key(cards: &[QuestionCard], position: usize) -> Option<QuestionRef> {
    cards.get(position).map(QuestionCard::key)
}

fn answer_card(card: &mut QuestionCard, option: OptionKey) {
    if !card.select(option) {
        println!("already answered");
        return;
    }
    card.reveal();
    match card.is_correct() {
        Some(true) => println!("correct"),
        _ => println!("incorrect, answer is {}", card.question().answer.letter()),
    }
}

//
// ─── SCORES ────────────────────────────────────────────────────────────────────
//

/// Print the last score of every quiz of `license`.
///
/// # Errors
///
/// Returns the ledger's `StorageError`.
pub async fn print_scores(
    ledger: &ProgressLedger,
    catalog: &dyn QuestionCatalog,
    license: LicenseType,
) -> Result<(), Box<dyn std::error::Error>> {
    let scores = ledger.list_scores(license).await?;
    println!("Last scores, {}", license.display_name());
    for quiz in catalog.quiz_numbers(license) {
        match scores.get(quiz) {
            Some(record) => println!(
                "  quiz {quiz:>3}: {:>3}/{:<3} {}{}",
                record.score,
                record.total,
                iso_timestamp(record.recorded_at),
                if record.is_perfect() { " perfect" } else { "" }
            ),
            None => println!("  quiz {quiz:>3}: -"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_input_accepts_digits_letters_and_commands() {
        assert_eq!(parse_quiz_input("2"), Some(QuizInput::Select(OptionKey::Two)));
        assert_eq!(parse_quiz_input(" c "), Some(QuizInput::Select(OptionKey::Three)));
        assert_eq!(parse_quiz_input("g 5"), Some(QuizInput::Goto(4)));
        assert_eq!(parse_quiz_input("g 0"), None);
        assert_eq!(parse_quiz_input("m"), Some(QuizInput::Bookmark));
        assert_eq!(parse_quiz_input("k"), Some(QuizInput::Continue));
        assert_eq!(parse_quiz_input("t"), Some(QuizInput::ToggleAutoNext));
        assert_eq!(parse_quiz_input("x"), None);
    }

    #[test]
    fn review_input_defaults_to_more() {
        assert_eq!(parse_review_input(""), Some(ReviewInput::More));
        assert_eq!(parse_review_input("b 2"), Some(ReviewInput::Bookmark(1)));
        assert_eq!(
            parse_review_input("a 1 b"),
            Some(ReviewInput::Answer(0, OptionKey::Two))
        );
        assert_eq!(parse_review_input("d"), None);
    }
}
