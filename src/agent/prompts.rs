//! Role instructions and few-shot seeds for each agent

use crate::conversation::{Conversation, Turn};

/// Instruction for the agent that encodes puzzles as SMT-LIB
pub const SOLVER_ROLE: &str = "Role: Encode the logic puzzle you are given as SMT-LIB code, covering every \
explicit and implicit fact, and explain which implicit facts you encode. Anything under \"Guiding Questions:\" \
is advice, not part of the puzzle. Always include a set-logic command. I will run the last SMT-LIB program you \
send through an SMT solver and reply with its output. When the output shows an error, fix the syntax or the \
misread constraint and send the whole program again. Keep refining until the solver returns a model that fits \
the puzzle. Once your final program runs cleanly, reply only 'I am done.'";

/// Instruction for the agent that grades solutions against an answer key
pub const GRADER_ROLE: &str = "Role: Grade SMT-LIB solver results numerically. Using the answer key, the model \
conversation and the latest solver output, give a score in the format X/Y. X is the number of correct \
assignments in the final answer, with partial credit; interpret the model even when the solver output contains \
errors. Grade only the last puzzle solved. Y is the total number of assignments in the answer key. A blank \
answer, or one that only repeats the clues, scores 0. Explain how you arrived at both X and Y.";

/// Instruction for the agent that breaks puzzles into guiding questions
pub const DECOMPOSER_ROLE: &str = "Role: You plan the solution of a logic puzzle for a teammate who will \
encode it in SMT-LIB. Break the puzzle into small sub-problems, ordered so each builds on the previous ones, \
and state each as one short line. Point out dependencies between sub-problems. Make clear these are \
suggestions to consider, not steps to follow blindly.";

/// Instruction for solving puzzles directly in natural language
pub const DIRECT_SOLVER_ROLE: &str = "Role: Solve the logic puzzle you are given, assigning every item \
according to the clues. Explain your reasoning step by step and present the final assignment clearly.";

/// Instruction for grading natural-language solutions
pub const DIRECT_GRADER_ROLE: &str = "Role: Grade natural-language logic puzzle solutions numerically. Using \
the answer key and the model conversation, give a score in the format X/Y. X is the number of correct \
assignments in the final answer, with partial credit even when the explanation contains mistakes. Grade only \
the last puzzle solved. Y is the total number of assignments in the answer key. Explain how you arrived at \
both X and Y.";

const SMT_EXAMPLE_PUZZLE: &str = "Here is an example puzzle with feedback from the solver. Follow the same \
workflow for the puzzle you receive.
Ages, names, lengths
5, 10, 15, 20
Barnabas, Bubba, Draco, Merlin
9.4 feet, 10.2 feet, 12.0 feet, 14.0 feet

Merlin is somewhat older than Bubba.
Merlin is 10.2 feet long.
Bubba is 10 years older than the gator that is 14.0 feet long.
Barnabas is 12.0 feet long.";

const SMT_EXAMPLE_FIRST_ATTEMPT: &str = "Each gator gets an integer age and a real length.

(set-logic QF_LIA)
(declare-const Merlin_Age Int)
(declare-const Bubba_Age Int)
(declare-const Draco_Age Int)
(declare-const Barnabas_Age Int)
(declare-const Merlin_Length Real)
(declare-const Bubba_Length Real)
(declare-const Draco_Length Real)
(declare-const Barnabas_Length Real)
(assert (distinct Merlin_Age Bubba_Age Draco_Age Barnabas_Age))
(assert (distinct Merlin_Length Bubba_Length Draco_Length Barnabas_Length))
(assert (> Merlin_Age Bubba_Age))
(assert (= Merlin_Length 10.2))
(assert (= Barnabas_Length 12.0))
(check-sat)
(get-model)";

const SMT_EXAMPLE_FIRST_FEEDBACK: &str = "(error \"line 6 column 34: logic does not support reals\")
(error \"line 7 column 32: logic does not support reals\")
(error \"line 8 column 32: logic does not support reals\")
(error \"line 9 column 35: logic does not support reals\")
(error \"line 12 column 12: unknown constant Merlin_Length\")
sat";

const SMT_EXAMPLE_REPAIR: &str = "QF_LIA has no reals. QF_LIRA supports both integers and reals, and I also \
add the value domains and the remaining clue.

(set-logic QF_LIRA)
(declare-const Merlin_Age Int)
(declare-const Bubba_Age Int)
(declare-const Draco_Age Int)
(declare-const Barnabas_Age Int)
(declare-const Merlin_Length Real)
(declare-const Bubba_Length Real)
(declare-const Draco_Length Real)
(declare-const Barnabas_Length Real)
(assert (and
  (or (= Merlin_Age 5) (= Merlin_Age 10) (= Merlin_Age 15) (= Merlin_Age 20))
  (or (= Bubba_Age 5) (= Bubba_Age 10) (= Bubba_Age 15) (= Bubba_Age 20))
  (or (= Draco_Age 5) (= Draco_Age 10) (= Draco_Age 15) (= Draco_Age 20))
  (or (= Barnabas_Age 5) (= Barnabas_Age 10) (= Barnabas_Age 15) (= Barnabas_Age 20))))
(assert (and
  (or (= Merlin_Length 9.4) (= Merlin_Length 10.2) (= Merlin_Length 12.0) (= Merlin_Length 14.0))
  (or (= Bubba_Length 9.4) (= Bubba_Length 10.2) (= Bubba_Length 12.0) (= Bubba_Length 14.0))
  (or (= Draco_Length 9.4) (= Draco_Length 10.2) (= Draco_Length 12.0) (= Draco_Length 14.0))
  (or (= Barnabas_Length 9.4) (= Barnabas_Length 10.2) (= Barnabas_Length 12.0) (= Barnabas_Length 14.0))))
(assert (> Merlin_Age Bubba_Age))
(assert (= Merlin_Length 10.2))
(assert (or (and (= Draco_Length 14.0) (= Bubba_Age (+ Draco_Age 10)))
            (and (= Barnabas_Length 14.0) (= Bubba_Age (+ Barnabas_Age 10)))))
(assert (= Barnabas_Length 12.0))
(assert (distinct Merlin_Age Bubba_Age Draco_Age Barnabas_Age))
(assert (distinct Merlin_Length Bubba_Length Draco_Length Barnabas_Length))
(check-sat)
(get-model)";

const SMT_EXAMPLE_SOLVED: &str = "sat
(
  (define-fun Merlin_Age () Int
    20)
  (define-fun Bubba_Length () Real
    (/ 47.0 5.0))
  (define-fun Barnabas_Age () Int
    10)
  (define-fun Bubba_Age () Int
    15)
  (define-fun Merlin_Length () Real
    (/ 51.0 5.0))
  (define-fun Draco_Age () Int
    5)
  (define-fun Barnabas_Length () Real
    12.0)
  (define-fun Draco_Length () Real
    14.0)
)";

const DIRECT_EXAMPLE_PUZZLE: &str = "Movie-Genre: epic, superhero, zombie
Transport: airplane, helicopter, roller
1. Transport:airplane and Movie-Genre:superhero have different parity positions
2. Transport:helicopter is not to the left of Movie-Genre:superhero
3. Movie-Genre:epic is somewhere to the right of Movie-Genre:zombie
4. Movie-Genre:superhero is somewhere to the right of Movie-Genre:epic";

const DIRECT_EXAMPLE_ANSWER: &str = "Clues 3 and 4 order the genres: zombie, epic, superhero. \
Superhero is third, and by clue 2 the helicopter cannot be left of it, so the helicopter is third. \
Clue 1 puts the airplane at an even position, the second. The roller takes the first.

1. Zombie - Roller
2. Epic - Airplane
3. Superhero - Helicopter";

/// Six-turn seed showing a failed encoding, its repair and the sign-off
pub fn smt_seed() -> Vec<Turn> {
    Conversation::seed_from_texts([
        SMT_EXAMPLE_PUZZLE,
        SMT_EXAMPLE_FIRST_ATTEMPT,
        SMT_EXAMPLE_FIRST_FEEDBACK,
        SMT_EXAMPLE_REPAIR,
        SMT_EXAMPLE_SOLVED,
        "I am done.",
    ])
}

/// Two-turn seed for direct solving
pub fn direct_seed() -> Vec<Turn> {
    Conversation::seed_from_texts([DIRECT_EXAMPLE_PUZZLE, DIRECT_EXAMPLE_ANSWER])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::extract::{extract_artifact, LOGIC_START_MARKER};

    #[test]
    fn test_seeds_alternate_and_end_with_agent() {
        for seed in [smt_seed(), direct_seed()] {
            assert_eq!(seed.len() % 2, 0);
            assert_eq!(seed.last().map(|t| t.role), Some(Role::Agent));
        }
    }

    #[test]
    fn test_smt_seed_repair_is_extractable() {
        let seed = smt_seed();
        let artifact = extract_artifact(&seed[3].text);
        assert!(artifact.starts_with(LOGIC_START_MARKER));
        assert!(artifact.contains("QF_LIRA"));
    }
}
